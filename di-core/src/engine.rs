//! Idle evaluator state machine
//!
//! Classifies each device per poll from its cumulative I/O counters and
//! decides when a spin-down is due.
//!
//! # How It Works
//!
//! 1. **New disk**: the first successful sample creates a `DiskRecord` with
//!    `last_io = spinup_at = now` and resolves the idle threshold from the
//!    rule table once. The threshold is never re-resolved.
//!
//! 2. **Unchanged counters**: the disk is idle. If it is still running, a
//!    nonzero threshold has been reached (`>=`, so a disk idle for exactly
//!    the threshold is eligible this poll) the record is marked spun down and
//!    the caller is told to issue the power command. While spun down no
//!    further command is requested (idempotent suppression).
//!
//! 3. **Changed counters**: activity. The OS has already transparently woken
//!    the disk if it was asleep; the evaluator only observes this. Counters
//!    and `last_io` are updated and the episode is re-armed.
//!
//! The counters are the authoritative idle signal; the OS sleep-state query
//! feeds in only through `mark_asleep`, which records an externally observed
//! power-down without issuing any command.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::registry::{DiskRecord, DiskRegistry};
use crate::rules::RuleTable;
use crate::Sample;

/// Outcome of one observation of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// First observation; a record was created.
    NewDisk { idle_timeout: Duration },
    /// The idle threshold was crossed this poll. The record has already been
    /// marked spun down (optimistically); the caller must dispatch the
    /// spin-down command exactly once.
    SpinDown { idle_for: Duration },
    /// Idle but below threshold (or threshold zero); still running.
    IdleRunning {
        idle_for: Duration,
        idle_timeout: Duration,
    },
    /// Idle and already spun down; nothing to do.
    IdleSpunDown { idle_for: Duration },
    /// Counters changed. `woke` is true when the disk had been spun down.
    Activity { woke: bool },
}

/// The idle-detection state machine: rule table plus disk registry, driven by
/// one observation per managed device per poll pass.
#[derive(Debug)]
pub struct IdleEvaluator {
    rules: RuleTable,
    registry: DiskRegistry,
}

impl IdleEvaluator {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            registry: DiskRegistry::new(),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn registry(&self) -> &DiskRegistry {
        &self.registry
    }

    /// Feed one counter sample for `device` taken at `now` through the state
    /// machine and return what happened.
    pub fn observe(&mut self, device: &str, sample: Sample, now: Instant) -> Verdict {
        let Some(record) = self.registry.get_mut(device) else {
            let idle_timeout = self.rules.resolve(device);
            self.registry.insert(DiskRecord::new(
                device,
                sample.reads,
                sample.writes,
                idle_timeout,
                now,
            ));
            debug!(
                disk = device,
                idle_timeout_secs = idle_timeout.as_secs(),
                "new disk"
            );
            return Verdict::NewDisk { idle_timeout };
        };

        if record.reads == sample.reads && record.writes == sample.writes {
            let idle_for = record.idle_for(now);

            if record.spun_down {
                return Verdict::IdleSpunDown { idle_for };
            }

            // A zero threshold means "never spin down".
            if !record.idle_timeout.is_zero() && idle_for >= record.idle_timeout {
                record.spun_down = true;
                record.spindown_at = Some(now);
                return Verdict::SpinDown { idle_for };
            }

            Verdict::IdleRunning {
                idle_for,
                idle_timeout: record.idle_timeout,
            }
        } else {
            let woke = record.spun_down;
            if woke {
                record.spinup_at = now;
            }
            record.reads = sample.reads;
            record.writes = sample.writes;
            record.last_io = now;
            record.spun_down = false;
            Verdict::Activity { woke }
        }
    }

    /// Record that the OS reports `device` already powered down. Marks the
    /// record spun down without touching counters or timestamps, and without
    /// any command being dispatched. Returns false when the device has no
    /// record yet.
    pub fn mark_asleep(&mut self, device: &str) -> bool {
        match self.registry.get_mut(device) {
            Some(record) => {
                record.spun_down = true;
                true
            }
            None => false,
        }
    }
}
