//! Platform transport for diskidle
//!
//! Implements the `DiskPort` capability trait against the Windows storage
//! stack: physical drives are a dense zero-based index range
//! (`\\.\PhysicalDriveN`), I/O counters come from `IOCTL_DISK_PERFORMANCE`,
//! and power transitions are ATA pass-through commands (plus SCSI STOP UNIT
//! for the one-shot stop).
//!
//! On non-Windows targets a stub backend is compiled instead so the
//! workspace builds and the core test suite runs everywhere; it reports an
//! empty device range and refuses power commands.

#[cfg(windows)]
mod win;
#[cfg(windows)]
pub use win::WindowsDiskPort;

#[cfg(not(windows))]
mod unsupported;
#[cfg(not(windows))]
pub use unsupported::UnsupportedDiskPort;

/// The native port for the current target.
#[cfg(windows)]
pub fn native_port() -> WindowsDiskPort {
    WindowsDiskPort::new()
}

/// The native port for the current target.
#[cfg(not(windows))]
pub fn native_port() -> UnsupportedDiskPort {
    UnsupportedDiskPort::new()
}
