//! Stub backend for targets without a supported storage transport.
//!
//! Reports an empty device range so the poll loop idles harmlessly, and
//! refuses power commands. Exists so the core crates build and test on
//! development hosts that are not the deployment target.

use di_core::{DiskPort, PowerMode, ProbeOutcome, Sample, SpinDownCommand};
use di_error::{DiskIdleError, Result};

#[derive(Debug, Default)]
pub struct UnsupportedDiskPort;

impl UnsupportedDiskPort {
    pub fn new() -> Self {
        Self
    }
}

impl DiskPort for UnsupportedDiskPort {
    fn device_path(&self, index: u32) -> String {
        format!(r"\\.\PhysicalDrive{index}")
    }

    fn probe(&self, _device: &str) -> ProbeOutcome {
        ProbeOutcome::NotPresent
    }

    fn sample(&self, device: &str) -> Result<Sample> {
        Err(DiskIdleError::NotSupported(format!(
            "counter sampling for {device} on this platform"
        )))
    }

    fn check_power_mode(&self, _device: &str) -> PowerMode {
        PowerMode::Unknown
    }

    fn send_spin_down(&self, device: &str, command: SpinDownCommand) -> Result<()> {
        Err(DiskIdleError::NotSupported(format!(
            "{command} for {device} on this platform"
        )))
    }

    fn stop_unit(&self, device: &str) -> Result<()> {
        Err(DiskIdleError::NotSupported(format!(
            "stop unit for {device} on this platform"
        )))
    }
}
