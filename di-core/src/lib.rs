//! diskidle Core Library
//!
//! Platform-independent core of the diskidle disk spin-down daemon: idle
//! detection from cumulative I/O counters and the poll pass that drives it.
//!
//! # Module Structure
//!
//! - `rules` - Ordered idle-threshold rule table with a guaranteed fallback
//! - `registry` - Per-device tracked state, keyed by device identifier
//! - `engine` - The idle evaluator state machine (New / Running / SpunDown)
//! - `scheduler` - One enumeration pass: probe, sample, evaluate, dispatch
//! - `port` - The `DiskPort` capability trait the platform backend implements
//! - `config` - JSON configuration file model
//! - `constants` - Timing defaults and enumeration bounds
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use di_core::{IdleEvaluator, RuleTable};
//!
//! let mut rules = RuleTable::new(Duration::from_secs(60));
//! rules.add_rule(r"\\.\PhysicalDrive1", Duration::from_secs(300));
//!
//! let evaluator = IdleEvaluator::new(rules);
//! assert_eq!(evaluator.rules().sleep_interval(), Duration::from_secs(6));
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod port;
pub mod registry;
pub mod rules;
pub mod scheduler;

pub use config::{DaemonConfig, DiskRule};
pub use engine::{IdleEvaluator, Verdict};
pub use port::{DiskPort, DriveClass, PowerMode, ProbeOutcome, Sample, SpinDownCommand};
pub use registry::{DiskRecord, DiskRegistry};
pub use rules::{RuleEntry, RuleTable};
pub use scheduler::{run_pass, PassSummary};

// Re-export error types
pub use di_error::{DiskIdleError, Result};
