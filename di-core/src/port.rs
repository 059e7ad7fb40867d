//! The platform capability interface
//!
//! Everything the idle state machine needs from the operating system is
//! expressed as the `DiskPort` trait: probing a device index, sampling its
//! cumulative I/O counters, and issuing power commands. The platform-specific
//! transport (pass-through command structures, ioctls) lives behind this seam
//! so it can be swapped without touching the evaluator, and so the scheduler
//! can be driven by a scripted port in tests.

use std::fmt;

use di_error::Result;
use serde::{Deserialize, Serialize};

/// Result of probing one device index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The device index does not exist. Indices are probed as a contiguous
    /// range from zero, so this ends the enumeration pass.
    NotPresent,
    /// The device exists but could not be opened (access denied and the
    /// like). Skipped this pass; the pass continues.
    Unreachable(String),
    /// The OS power-state query says the device is already powered down.
    /// It must not be woken just to probe it.
    AlreadyAsleep,
    /// Not fixed local storage; permanently skipped.
    NotManaged(DriveClass),
    /// Fixed local storage; proceed to sampling.
    Managed,
}

/// Coarse device class, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveClass {
    Unknown,
    NoRootDir,
    Removable,
    Fixed,
    Remote,
    CdRom,
    RamDisk,
}

impl fmt::Display for DriveClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriveClass::Unknown => "unknown drive type",
            DriveClass::NoRootDir => "root path invalid",
            DriveClass::Removable => "removable media",
            DriveClass::Fixed => "fixed drive",
            DriveClass::Remote => "network drive",
            DriveClass::CdRom => "cdrom drive",
            DriveClass::RamDisk => "ramdisk",
        };
        f.write_str(s)
    }
}

/// Cumulative read/write operation counters for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub reads: u64,
    pub writes: u64,
}

/// Coarse power state decoded from ATA CHECK POWER MODE. Purely diagnostic;
/// the counters are the authoritative idle signal because this query is
/// unreliable on some hardware/driver combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    /// 0x00/0x01: standby.
    Standby,
    /// 0x40/0x41: NV-cache power mode.
    NvCache,
    /// 0x80..=0x83: idle.
    Idle,
    /// 0xFF: active or idle.
    ActiveOrIdle,
    /// Query failed or returned an unrecognized code.
    Unknown,
}

impl PowerMode {
    /// Decode the ATA sector-count register value returned by
    /// CHECK POWER MODE.
    pub fn from_ata_code(code: u8) -> Self {
        match code {
            0x00 | 0x01 => PowerMode::Standby,
            0x40 | 0x41 => PowerMode::NvCache,
            0x80..=0x83 => PowerMode::Idle,
            0xff => PowerMode::ActiveOrIdle,
            _ => PowerMode::Unknown,
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerMode::Standby => "standby mode",
            PowerMode::NvCache => "nv-cache power mode",
            PowerMode::Idle => "idle mode",
            PowerMode::ActiveOrIdle => "active or idle mode",
            PowerMode::Unknown => "unknown power mode",
        };
        f.write_str(s)
    }
}

/// Which immediate power transition the dispatcher sends on spin-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinDownCommand {
    /// ATA STANDBY IMMEDIATE (0xE0). The default.
    #[default]
    StandbyImmediate,
    /// ATA IDLE IMMEDIATE (0xE1).
    IdleImmediate,
}

impl fmt::Display for SpinDownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpinDownCommand::StandbyImmediate => "standby immediate",
            SpinDownCommand::IdleImmediate => "idle immediate",
        };
        f.write_str(s)
    }
}

/// Platform transport for device probing, counter sampling, and power
/// commands. Implementations must scope any device handle to the call:
/// acquired, used, and released before returning, on every exit path.
pub trait DiskPort {
    /// Map a zero-based device index to the platform device path used as the
    /// stable device identifier.
    fn device_path(&self, index: u32) -> String;

    /// Probe one device: reachability, sleep state, device class.
    /// Must not wake a sleeping device.
    fn probe(&self, device: &str) -> ProbeOutcome;

    /// Read cumulative read/write operation counts. Failure is non-fatal to
    /// the pass; the implementation may attempt a one-time environment
    /// remediation on the first failure it sees.
    fn sample(&self, device: &str) -> Result<Sample>;

    /// Read-only power-state query. Diagnostic only; failures are reported
    /// as `PowerMode::Unknown` rather than errors.
    fn check_power_mode(&self, device: &str) -> PowerMode;

    /// Flush the write cache (best effort) and issue the spin-down command.
    fn send_spin_down(&self, device: &str, command: SpinDownCommand) -> Result<()>;

    /// One-shot SCSI STOP UNIT for a single named device, used outside the
    /// poll loop for manual invocation.
    fn stop_unit(&self, device: &str) -> Result<()>;
}
