//! Poll pass driver
//!
//! One enumeration pass over the contiguous device index range: probe each
//! device, sample its counters, feed the evaluator, and dispatch the
//! spin-down command when a threshold crossing is reported. Every per-device
//! failure is contained within that device's handling; nothing here aborts
//! the pass.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::constants::poll;
use crate::engine::{IdleEvaluator, Verdict};
use crate::port::{DiskPort, ProbeOutcome, SpinDownCommand};

/// What one enumeration pass did, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Devices probed before the first "does not exist".
    pub probed: u32,
    /// Devices that reached the evaluator with a fresh sample.
    pub evaluated: u32,
    /// Spin-down commands dispatched this pass.
    pub spun_down: u32,
    /// Devices skipped due to probe or sample failures.
    pub skipped: u32,
}

/// Run one full enumeration pass at time `now`.
///
/// Device indices are probed from zero upward; the first index reported as
/// not present ends the pass. All other probe failures skip that device and
/// continue.
pub fn run_pass(
    port: &dyn DiskPort,
    evaluator: &mut IdleEvaluator,
    command: SpinDownCommand,
    now: Instant,
) -> PassSummary {
    let mut summary = PassSummary::default();

    for index in 0..poll::MAX_DEVICE_INDEX {
        let device = port.device_path(index);

        match port.probe(&device) {
            ProbeOutcome::NotPresent => break,
            ProbeOutcome::Unreachable(reason) => {
                warn!(disk = %device, %reason, "probing: device unreachable, skipping");
                summary.probed += 1;
                summary.skipped += 1;
                continue;
            }
            ProbeOutcome::AlreadyAsleep => {
                // Never wake a sleeping device just to sample it.
                evaluator.mark_asleep(&device);
                debug!(disk = %device, "probing: asleep");
                summary.probed += 1;
                continue;
            }
            ProbeOutcome::NotManaged(class) => {
                debug!(disk = %device, class = %class, "probing: not managed");
                summary.probed += 1;
                continue;
            }
            ProbeOutcome::Managed => {
                summary.probed += 1;
            }
        }

        // Informational only; never changes evaluator behavior.
        let power_mode = port.check_power_mode(&device);

        let sample = match port.sample(&device) {
            Ok(sample) => sample,
            Err(e) => {
                debug!(disk = %device, error = %e, "probing: cannot query read/write counts");
                summary.skipped += 1;
                continue;
            }
        };

        summary.evaluated += 1;

        match evaluator.observe(&device, sample, now) {
            Verdict::NewDisk { idle_timeout } => {
                debug!(
                    disk = %device,
                    reads = sample.reads,
                    writes = sample.writes,
                    idle_timeout_secs = idle_timeout.as_secs(),
                    power = %power_mode,
                    "probing: new disk"
                );
            }
            Verdict::SpinDown { idle_for } => {
                info!(
                    disk = %device,
                    idle_secs = idle_for.as_secs(),
                    %command,
                    "idle threshold reached, spinning down"
                );
                summary.spun_down += 1;
                // The record stays spun down even when the command fails;
                // retrying a rejected standby every poll is itself load.
                if let Err(e) = port.send_spin_down(&device, command) {
                    warn!(disk = %device, error = %e, "spin-down command failed");
                }
            }
            Verdict::IdleRunning {
                idle_for,
                idle_timeout,
            } => {
                debug!(
                    disk = %device,
                    reads = sample.reads,
                    writes = sample.writes,
                    elapsed_secs = idle_for.as_secs(),
                    idle_timeout_secs = idle_timeout.as_secs(),
                    power = %power_mode,
                    "probing: idle"
                );
            }
            Verdict::IdleSpunDown { idle_for } => {
                debug!(
                    disk = %device,
                    reads = sample.reads,
                    writes = sample.writes,
                    elapsed_secs = idle_for.as_secs(),
                    power = %power_mode,
                    "probing: spun down"
                );
            }
            Verdict::Activity { woke } => {
                debug!(
                    disk = %device,
                    reads = sample.reads,
                    writes = sample.writes,
                    woke,
                    power = %power_mode,
                    "probing: activity"
                );
            }
        }
    }

    summary
}
