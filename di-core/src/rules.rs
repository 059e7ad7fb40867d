//! Idle-threshold rule table
//!
//! An ordered list of per-disk idle thresholds plus a default that applies to
//! every disk without a specific rule. Resolution is first-match-wins over the
//! named rules; the default is always considered last, regardless of the
//! order rules were added in.

use std::time::Duration;

use crate::constants::{idle, poll};

/// A single named rule: this disk spins down after `idle_timeout` of
/// inactivity. A zero timeout means the disk is never spun down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub name: String,
    pub idle_timeout: Duration,
}

/// Ordered rule table with a guaranteed fallback rule.
///
/// The fallback is stored separately from the named rules, which makes the
/// "default is evaluated last" invariant structural instead of depending on
/// insertion order.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<RuleEntry>,
    default_timeout: Duration,
}

impl RuleTable {
    /// Create a table with the given fallback threshold and no named rules.
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            rules: Vec::new(),
            default_timeout,
        }
    }

    /// Append a named rule. Earlier rules win when two match the same disk.
    pub fn add_rule(&mut self, name: impl Into<String>, idle_timeout: Duration) {
        self.rules.push(RuleEntry {
            name: name.into(),
            idle_timeout,
        });
    }

    /// Replace the fallback threshold.
    pub fn set_default(&mut self, idle_timeout: Duration) {
        self.default_timeout = idle_timeout;
    }

    /// Change the timeout of the most recently added named rule, if any.
    /// Returns false when no named rule exists (callers then typically update
    /// the default instead).
    pub fn set_last_rule_timeout(&mut self, idle_timeout: Duration) -> bool {
        match self.rules.last_mut() {
            Some(rule) => {
                rule.idle_timeout = idle_timeout;
                true
            }
            None => false,
        }
    }

    /// Resolve the idle threshold for a disk by exact name match, falling
    /// back to the default rule.
    pub fn resolve(&self, disk: &str) -> Duration {
        self.rules
            .iter()
            .find(|rule| rule.name == disk)
            .map(|rule| rule.idle_timeout)
            .unwrap_or(self.default_timeout)
    }

    /// Named rules in evaluation order.
    pub fn rules(&self) -> &[RuleEntry] {
        &self.rules
    }

    /// The fallback threshold.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Compute the poll sleep interval from the configured thresholds:
    /// one tenth of the shortest nonzero threshold, clamped to 1..=10 seconds.
    /// When no nonzero threshold exists, a large sentinel stands in for the
    /// minimum, yielding the maximum interval.
    pub fn sleep_interval(&self) -> Duration {
        let mut min_secs = idle::IDLE_SENTINEL_SECS;

        for rule in &self.rules {
            let secs = rule.idle_timeout.as_secs();
            if secs != 0 && secs < min_secs {
                min_secs = secs;
            }
        }
        let default_secs = self.default_timeout.as_secs();
        if default_secs != 0 && default_secs < min_secs {
            min_secs = default_secs;
        }

        let interval = (min_secs / poll::SLEEP_DIVISOR)
            .clamp(poll::MIN_SLEEP_SECS, poll::MAX_SLEEP_SECS);
        Duration::from_secs(interval)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new(Duration::from_secs(idle::DEFAULT_IDLE_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn named_rule_wins_over_default() {
        let mut table = RuleTable::new(secs(600));
        table.add_rule(r"\\.\PhysicalDrive2", secs(120));

        assert_eq!(table.resolve(r"\\.\PhysicalDrive2"), secs(120));
        assert_eq!(table.resolve(r"\\.\PhysicalDrive0"), secs(600));
    }

    #[test]
    fn named_rule_wins_regardless_of_insertion_order() {
        // The default is structural, so adding it "first" is impossible;
        // exercise the closest thing: rules added after the default was set.
        let mut table = RuleTable::default();
        table.set_default(secs(30));
        table.add_rule("diskA", secs(900));

        assert_eq!(table.resolve("diskA"), secs(900));
        assert_eq!(table.resolve("diskB"), secs(30));
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut table = RuleTable::new(secs(600));
        table.add_rule("diskA", secs(100));
        table.add_rule("diskA", secs(200));

        assert_eq!(table.resolve("diskA"), secs(100));
    }

    #[test]
    fn set_last_rule_timeout_targets_most_recent() {
        let mut table = RuleTable::new(secs(600));
        assert!(!table.set_last_rule_timeout(secs(5)));

        table.add_rule("diskA", secs(60));
        table.add_rule("diskB", secs(60));
        assert!(table.set_last_rule_timeout(secs(30)));

        assert_eq!(table.resolve("diskA"), secs(60));
        assert_eq!(table.resolve("diskB"), secs(30));
    }

    #[test]
    fn sleep_interval_clamps_to_max() {
        let table = RuleTable::new(secs(600));
        assert_eq!(table.sleep_interval(), secs(10));
    }

    #[test]
    fn sleep_interval_clamps_to_min() {
        let table = RuleTable::new(secs(5));
        assert_eq!(table.sleep_interval(), secs(1));
    }

    #[test]
    fn sleep_interval_uses_shortest_nonzero_threshold() {
        let mut table = RuleTable::new(secs(600));
        table.add_rule("diskA", secs(60));
        assert_eq!(table.sleep_interval(), secs(6));
    }

    #[test]
    fn sleep_interval_ignores_zero_thresholds() {
        let mut table = RuleTable::new(secs(0));
        table.add_rule("diskA", secs(0));
        // No finite nonzero threshold: sentinel yields the maximum interval.
        assert_eq!(table.sleep_interval(), secs(10));
    }
}
