//! Constants and configuration defaults for diskidle
//!
//! Centralizes timing values and enumeration bounds. Never use magic numbers
//! in other files - add them here first.

/// Idle detection timing
pub mod idle {
    /// Canonical default idle threshold in seconds (ten minutes). Used by
    /// `RuleTable::default()`.
    pub const DEFAULT_IDLE_SECS: u64 = 600;

    /// Idle threshold the shipped daemon compiles in when no rule is given.
    pub const SHIPPED_DEFAULT_IDLE_SECS: u64 = 60;

    /// Sentinel used in the minimum-threshold computation when every
    /// configured threshold is zero ("never spin down").
    pub const IDLE_SENTINEL_SECS: u64 = 1 << 30;
}

/// Poll scheduling
pub mod poll {
    /// The sleep interval is the shortest nonzero threshold divided by this,
    /// so detection granularity is roughly a tenth of the most aggressive
    /// threshold.
    pub const SLEEP_DIVISOR: u64 = 10;

    /// Lower clamp for the computed sleep interval in seconds.
    pub const MIN_SLEEP_SECS: u64 = 1;

    /// Upper clamp for the computed sleep interval in seconds.
    pub const MAX_SLEEP_SECS: u64 = 10;

    /// Hard upper bound on the device index range probed per pass.
    pub const MAX_DEVICE_INDEX: u32 = 255;
}
