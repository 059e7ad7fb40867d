//! Windows storage transport
//!
//! Physical drives are probed by index (`\\.\PhysicalDrive0` upward), I/O
//! counters come from `IOCTL_DISK_PERFORMANCE`, the power-state fast path is
//! `GetDevicePowerState`, and power transitions are ATA pass-through
//! commands. The one-shot stop uses SCSI STOP UNIT instead, matching what
//! external enclosures expect.
//!
//! Handle discipline: every handle is a scoped `DriveHandle` released on
//! drop, so no handle outlives the call that opened it, on any exit path.
//!
//! Probe handles are opened with zero access rights. Requesting
//! GENERIC_READ/GENERIC_WRITE on open wakes a sleeping drive, which the
//! prober must never do; power-command handles do open read/write because
//! the pass-through ioctls require it (at that point we are waking or
//! stopping the drive on purpose).

use std::ffi::c_void;
use std::mem::size_of;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    CloseHandle, GENERIC_READ, GENERIC_WRITE, BOOL, ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND,
    ERROR_INVALID_FUNCTION, HANDLE,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FlushFileBuffers, GetDriveTypeW, DRIVE_CDROM, DRIVE_FIXED, DRIVE_NO_ROOT_DIR,
    DRIVE_RAMDISK, DRIVE_REMOTE, DRIVE_REMOVABLE, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ,
    FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::Storage::IscsiDisc::{
    ATA_PASS_THROUGH_EX, IOCTL_ATA_PASS_THROUGH, IOCTL_SCSI_PASS_THROUGH, SCSI_IOCTL_DATA_IN,
    SCSI_PASS_THROUGH,
};
use windows::Win32::System::Ioctl::{DISK_PERFORMANCE, IOCTL_DISK_PERFORMANCE};
use windows::Win32::System::Power::GetDevicePowerState;
use windows::Win32::System::IO::DeviceIoControl;

use di_core::{DiskPort, DriveClass, PowerMode, ProbeOutcome, Sample, SpinDownCommand};
use di_error::{DiskIdleError, Result};

/// ATA command register values for the immediate power transitions.
const ATA_CMD_STANDBY_IMMEDIATE: u8 = 0xe0;
const ATA_CMD_IDLE_IMMEDIATE: u8 = 0xe1;
const ATA_CMD_CHECK_POWER_MODE: u8 = 0xe5;

/// Pass-through timeouts in seconds.
const ATA_TIMEOUT_SECS: u32 = 3;
const SCSI_STOP_TIMEOUT_SECS: u32 = 30;

/// SCSI STOP UNIT command descriptor block.
const SCSI_STOP_UNIT_CDB: [u8; 6] = [0x1b, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Whether the one-time `diskperf -YD` remediation has been attempted.
static TRIED_DISKPERF: AtomicBool = AtomicBool::new(false);

fn wide(s: &str) -> Vec<u16> {
    use std::os::windows::prelude::*;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Scoped device handle, closed on drop.
struct DriveHandle {
    handle: HANDLE,
}

impl DriveHandle {
    /// Open a raw device with the given access rights. Zero access opens the
    /// device for metadata queries only, without spinning it up.
    fn open(device: &str, access: u32) -> Result<Self> {
        let path = wide(device);
        // SAFETY: path is a valid NUL-terminated wide string that outlives
        // the call.
        let handle = unsafe {
            CreateFileW(
                PCWSTR(path.as_ptr()),
                access,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        };

        match handle {
            Ok(handle) => Ok(Self { handle }),
            Err(e) if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() => {
                Err(DiskIdleError::DeviceNotFound(device.to_string()))
            }
            Err(e) if e.code() == ERROR_ACCESS_DENIED.to_hresult() => {
                Err(DiskIdleError::AccessDenied(device.to_string()))
            }
            Err(e) => Err(DiskIdleError::DeviceOpen {
                device: device.to_string(),
                reason: e.message().to_string(),
            }),
        }
    }

    fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for DriveHandle {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful CreateFileW and is closed
        // exactly once.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// `DiskPort` implementation for the Windows storage stack.
#[derive(Debug, Default)]
pub struct WindowsDiskPort;

impl WindowsDiskPort {
    pub fn new() -> Self {
        Self
    }

    /// Issue one ATA pass-through command and return the task file.
    fn ata_command(&self, handle: &DriveHandle, command: u8) -> Result<ATA_PASS_THROUGH_EX> {
        let mut cmd = ATA_PASS_THROUGH_EX {
            Length: size_of::<ATA_PASS_THROUGH_EX>() as u16,
            TimeOutValue: ATA_TIMEOUT_SECS,
            ..Default::default()
        };
        cmd.CurrentTaskFile[6] = command;

        let mut returned = 0u32;
        // SAFETY: cmd is used as both input and output buffer, as
        // IOCTL_ATA_PASS_THROUGH requires; both live until the call returns.
        unsafe {
            DeviceIoControl(
                handle.raw(),
                IOCTL_ATA_PASS_THROUGH,
                Some(&cmd as *const _ as *const c_void),
                size_of::<ATA_PASS_THROUGH_EX>() as u32,
                Some(&mut cmd as *mut _ as *mut c_void),
                size_of::<ATA_PASS_THROUGH_EX>() as u32,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|e| DiskIdleError::Generic(e.message().to_string()))?;

        Ok(cmd)
    }

    /// Best-effort write cache flush; a failure must not block the power
    /// command that follows.
    fn flush_cache(&self, device: &str, handle: &DriveHandle) {
        // SAFETY: handle is open with write access.
        if unsafe { FlushFileBuffers(handle.raw()) }.is_err() {
            warn!(disk = %device, "failed to flush file buffers / write cache");
        }
    }

    /// Run `diskperf -YD` once per process the first time counter sampling
    /// fails with "invalid function" (performance counters disabled).
    fn try_enable_disk_counters(&self, device: &str) {
        if TRIED_DISKPERF.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(disk = %device, "disk performance counters unavailable, running diskperf -YD");
        match Command::new("diskperf").arg("-YD").status() {
            Ok(status) if status.success() => {
                debug!("diskperf -YD succeeded, counters available next pass")
            }
            Ok(status) => warn!(%status, "diskperf -YD failed"),
            Err(e) => warn!(error = %e, "could not run diskperf"),
        }
    }
}

impl DiskPort for WindowsDiskPort {
    fn device_path(&self, index: u32) -> String {
        format!(r"\\.\PhysicalDrive{index}")
    }

    fn probe(&self, device: &str) -> ProbeOutcome {
        let handle = match DriveHandle::open(device, 0) {
            Ok(handle) => handle,
            Err(DiskIdleError::DeviceNotFound(_)) => return ProbeOutcome::NotPresent,
            Err(DiskIdleError::AccessDenied(_)) => {
                return ProbeOutcome::Unreachable(
                    "access denied (administrator privileges required)".to_string(),
                )
            }
            Err(e) => return ProbeOutcome::Unreachable(e.to_string()),
        };

        // Sleep-state fast path. A failed query is treated as asleep too:
        // waking a drive because the hint was unreadable is the worse error.
        let mut on = BOOL::default();
        // SAFETY: handle is a valid open device handle.
        let state_known = unsafe { GetDevicePowerState(handle.raw(), &mut on) };
        if !state_known.as_bool() || !on.as_bool() {
            return ProbeOutcome::AlreadyAsleep;
        }

        let root = wide(&format!("{device}\\"));
        // SAFETY: root is a valid NUL-terminated wide string.
        let drive_type = unsafe { GetDriveTypeW(PCWSTR(root.as_ptr())) };
        match drive_type {
            DRIVE_FIXED => ProbeOutcome::Managed,
            DRIVE_NO_ROOT_DIR => ProbeOutcome::NotManaged(DriveClass::NoRootDir),
            DRIVE_REMOVABLE => ProbeOutcome::NotManaged(DriveClass::Removable),
            DRIVE_REMOTE => ProbeOutcome::NotManaged(DriveClass::Remote),
            DRIVE_CDROM => ProbeOutcome::NotManaged(DriveClass::CdRom),
            DRIVE_RAMDISK => ProbeOutcome::NotManaged(DriveClass::RamDisk),
            _ => ProbeOutcome::NotManaged(DriveClass::Unknown),
        }
    }

    fn sample(&self, device: &str) -> Result<Sample> {
        let handle = DriveHandle::open(device, 0)?;

        let mut perf = DISK_PERFORMANCE::default();
        let mut returned = 0u32;
        // SAFETY: perf lives until the call returns and is large enough for
        // the fixed-size DISK_PERFORMANCE output.
        let result = unsafe {
            DeviceIoControl(
                handle.raw(),
                IOCTL_DISK_PERFORMANCE,
                None,
                0,
                Some(&mut perf as *mut _ as *mut c_void),
                size_of::<DISK_PERFORMANCE>() as u32,
                Some(&mut returned),
                None,
            )
        };

        if let Err(e) = result {
            if e.code() == ERROR_INVALID_FUNCTION.to_hresult() {
                self.try_enable_disk_counters(device);
            }
            return Err(DiskIdleError::sample_query(device, e.message().to_string()));
        }
        if returned == 0 {
            return Err(DiskIdleError::sample_query(device, "empty counter reply"));
        }

        Ok(Sample {
            reads: perf.ReadCount as u64,
            writes: perf.WriteCount as u64,
        })
    }

    fn check_power_mode(&self, device: &str) -> PowerMode {
        // Diagnostic only; any failure collapses to Unknown.
        let handle = match DriveHandle::open(device, GENERIC_READ.0 | GENERIC_WRITE.0) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(disk = %device, error = %e, "check power mode: cannot open device");
                return PowerMode::Unknown;
            }
        };

        match self.ata_command(&handle, ATA_CMD_CHECK_POWER_MODE) {
            // Sector count register holds the power mode code.
            Ok(reply) => PowerMode::from_ata_code(reply.CurrentTaskFile[1]),
            Err(e) => {
                debug!(disk = %device, error = %e, "check power mode failed");
                PowerMode::Unknown
            }
        }
    }

    fn send_spin_down(&self, device: &str, command: SpinDownCommand) -> Result<()> {
        let handle = DriveHandle::open(device, GENERIC_READ.0 | GENERIC_WRITE.0)?;

        self.flush_cache(device, &handle);

        let ata_command = match command {
            SpinDownCommand::StandbyImmediate => ATA_CMD_STANDBY_IMMEDIATE,
            SpinDownCommand::IdleImmediate => ATA_CMD_IDLE_IMMEDIATE,
        };
        self.ata_command(&handle, ata_command)
            .map_err(|e| DiskIdleError::power_command(device, command.to_string(), e.to_string()))?;

        debug!(disk = %device, %command, "power command sent");
        Ok(())
    }

    fn stop_unit(&self, device: &str) -> Result<()> {
        let handle = DriveHandle::open(device, GENERIC_READ.0 | GENERIC_WRITE.0)?;

        self.flush_cache(device, &handle);

        let mut cmd = SCSI_PASS_THROUGH {
            Length: size_of::<SCSI_PASS_THROUGH>() as u16,
            CdbLength: SCSI_STOP_UNIT_CDB.len() as u8,
            DataIn: SCSI_IOCTL_DATA_IN as u8,
            TimeOutValue: SCSI_STOP_TIMEOUT_SECS,
            ..Default::default()
        };
        cmd.Cdb[..SCSI_STOP_UNIT_CDB.len()].copy_from_slice(&SCSI_STOP_UNIT_CDB);

        let mut reply = [0u8; 100];
        let mut returned = 0u32;
        // SAFETY: cmd and reply live until the call returns.
        unsafe {
            DeviceIoControl(
                handle.raw(),
                IOCTL_SCSI_PASS_THROUGH,
                Some(&cmd as *const _ as *const c_void),
                size_of::<SCSI_PASS_THROUGH>() as u32,
                Some(reply.as_mut_ptr() as *mut c_void),
                reply.len() as u32,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|e| {
            DiskIdleError::power_command(device, "scsi stop unit", e.message().to_string())
        })?;

        debug!(disk = %device, "scsi stop unit sent");
        Ok(())
    }
}
