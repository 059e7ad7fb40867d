//! In-memory disk registry
//!
//! One `DiskRecord` per distinct device identifier, created on the first
//! successful counter sample and kept for the lifetime of the process. A
//! device that disappears from enumeration simply stops being visited; its
//! record goes stale but is never destroyed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracked state for one device.
#[derive(Debug, Clone)]
pub struct DiskRecord {
    /// Stable device identifier (the platform device path).
    pub id: String,
    /// Last observed cumulative read-operation count.
    pub reads: u64,
    /// Last observed cumulative write-operation count.
    pub writes: u64,
    /// When the counters last changed (or when the record was created).
    pub last_io: Instant,
    /// Most recent transition into the running state.
    pub spinup_at: Instant,
    /// Most recent transition into the spun-down state, if any.
    pub spindown_at: Option<Instant>,
    /// Whether the disk is currently considered spun down.
    pub spun_down: bool,
    /// Idle threshold resolved from the rule table at creation time.
    /// Immutable afterwards; zero means never spin down.
    pub idle_timeout: Duration,
}

impl DiskRecord {
    /// Create a record for a disk first observed at `now`.
    pub fn new(id: impl Into<String>, reads: u64, writes: u64, idle_timeout: Duration, now: Instant) -> Self {
        Self {
            id: id.into(),
            reads,
            writes,
            last_io: now,
            spinup_at: now,
            spindown_at: None,
            spun_down: false,
            idle_timeout,
        }
    }

    /// Elapsed idle time as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_io)
    }
}

/// Registry of all disks observed since process start, keyed by device
/// identifier. Single control path; no locking needed.
#[derive(Debug, Default)]
pub struct DiskRegistry {
    disks: HashMap<String, DiskRecord>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&DiskRecord> {
        self.disks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DiskRecord> {
        self.disks.get_mut(id)
    }

    /// Insert a freshly created record. There is exactly one record per
    /// device identifier; inserting an id twice replaces the old record.
    pub fn insert(&mut self, record: DiskRecord) {
        self.disks.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiskRecord> {
        self.disks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_starts_running_with_creation_timestamps() {
        let now = Instant::now();
        let record = DiskRecord::new("d0", 10, 20, Duration::from_secs(60), now);

        assert!(!record.spun_down);
        assert_eq!(record.last_io, now);
        assert_eq!(record.spinup_at, now);
        assert_eq!(record.spindown_at, None);
        assert_eq!(record.idle_for(now), Duration::ZERO);
    }

    #[test]
    fn registry_keeps_one_record_per_id() {
        let now = Instant::now();
        let mut registry = DiskRegistry::new();
        registry.insert(DiskRecord::new("d0", 1, 1, Duration::from_secs(60), now));
        registry.insert(DiskRecord::new("d0", 2, 2, Duration::from_secs(60), now));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("d0").unwrap().reads, 2);
    }
}
