/*
 * Integration tests for the poll pass
 *
 * These drive `run_pass` against a scripted in-memory DiskPort to verify the
 * enumeration contract, per-device failure containment, and the interaction
 * between the evaluator and the power-command dispatcher.
 */

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use di_core::{
    run_pass, DiskPort, DriveClass, IdleEvaluator, PowerMode, ProbeOutcome, Result, RuleTable,
    Sample, SpinDownCommand,
};
use di_error::DiskIdleError;

/// Per-device script for one pass.
#[derive(Clone)]
struct DeviceScript {
    probe: ProbeOutcome,
    /// `None` makes the counter query fail.
    sample: Option<Sample>,
}

impl DeviceScript {
    fn managed(reads: u64, writes: u64) -> Self {
        Self {
            probe: ProbeOutcome::Managed,
            sample: Some(Sample { reads, writes }),
        }
    }
}

/// Scripted DiskPort: devices are a dense index range, everything past the
/// scripted list reports NotPresent. Records every dispatched power command.
#[derive(Default)]
struct ScriptedPort {
    devices: RefCell<Vec<DeviceScript>>,
    commands: RefCell<Vec<(String, SpinDownCommand)>>,
    stops: RefCell<Vec<String>>,
    probe_calls: Cell<u32>,
    sample_calls: Cell<u32>,
    fail_spin_down: Cell<bool>,
}

impl ScriptedPort {
    fn with_devices(devices: Vec<DeviceScript>) -> Self {
        Self {
            devices: RefCell::new(devices),
            ..Self::default()
        }
    }

    fn set_device(&self, index: usize, script: DeviceScript) {
        self.devices.borrow_mut()[index] = script;
    }

    fn index_of(&self, device: &str) -> usize {
        device
            .trim_start_matches(r"\\.\PhysicalDrive")
            .parse()
            .expect("scripted device path")
    }

    fn commands(&self) -> Vec<(String, SpinDownCommand)> {
        self.commands.borrow().clone()
    }
}

impl DiskPort for ScriptedPort {
    fn device_path(&self, index: u32) -> String {
        format!(r"\\.\PhysicalDrive{index}")
    }

    fn probe(&self, device: &str) -> ProbeOutcome {
        self.probe_calls.set(self.probe_calls.get() + 1);
        let index = self.index_of(device);
        self.devices
            .borrow()
            .get(index)
            .map(|script| script.probe.clone())
            .unwrap_or(ProbeOutcome::NotPresent)
    }

    fn sample(&self, device: &str) -> Result<Sample> {
        self.sample_calls.set(self.sample_calls.get() + 1);
        let index = self.index_of(device);
        self.devices.borrow()[index]
            .sample
            .ok_or_else(|| DiskIdleError::sample_query(device, "scripted failure"))
    }

    fn check_power_mode(&self, _device: &str) -> PowerMode {
        PowerMode::Unknown
    }

    fn send_spin_down(&self, device: &str, command: SpinDownCommand) -> Result<()> {
        self.commands
            .borrow_mut()
            .push((device.to_string(), command));
        if self.fail_spin_down.get() {
            Err(DiskIdleError::power_command(
                device,
                command.to_string(),
                "scripted failure",
            ))
        } else {
            Ok(())
        }
    }

    fn stop_unit(&self, device: &str) -> Result<()> {
        self.stops.borrow_mut().push(device.to_string());
        Ok(())
    }
}

fn evaluator(default_secs: u64) -> IdleEvaluator {
    IdleEvaluator::new(RuleTable::new(Duration::from_secs(default_secs)))
}

const STANDBY: SpinDownCommand = SpinDownCommand::StandbyImmediate;

#[test]
fn enumeration_stops_at_first_missing_index() {
    let port = ScriptedPort::with_devices(vec![
        DeviceScript::managed(1, 1),
        DeviceScript::managed(2, 2),
        DeviceScript::managed(3, 3),
    ]);
    let mut eval = evaluator(60);

    let summary = run_pass(&port, &mut eval, STANDBY, Instant::now());

    assert_eq!(summary.probed, 3);
    assert_eq!(summary.evaluated, 3);
    assert_eq!(eval.registry().len(), 3);
    // Exactly N probes plus the terminating one.
    assert_eq!(port.probe_calls.get(), 4);
}

#[test]
fn unreachable_device_is_skipped_and_pass_continues() {
    let port = ScriptedPort::with_devices(vec![
        DeviceScript {
            probe: ProbeOutcome::Unreachable("access denied".to_string()),
            sample: None,
        },
        DeviceScript::managed(5, 5),
    ]);
    let mut eval = evaluator(60);

    let summary = run_pass(&port, &mut eval, STANDBY, Instant::now());

    assert_eq!(summary.probed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.evaluated, 1);
    assert!(eval.registry().get(r"\\.\PhysicalDrive0").is_none());
    assert!(eval.registry().get(r"\\.\PhysicalDrive1").is_some());
}

#[test]
fn not_managed_device_is_never_sampled() {
    let port = ScriptedPort::with_devices(vec![DeviceScript {
        probe: ProbeOutcome::NotManaged(DriveClass::Removable),
        sample: Some(Sample { reads: 1, writes: 1 }),
    }]);
    let mut eval = evaluator(60);

    run_pass(&port, &mut eval, STANDBY, Instant::now());

    assert_eq!(port.sample_calls.get(), 0);
    assert!(eval.registry().is_empty());
}

#[test]
fn spin_down_dispatched_exactly_once_per_idle_episode() {
    let port = ScriptedPort::with_devices(vec![DeviceScript::managed(7, 7)]);
    let mut eval = evaluator(60);
    let t0 = Instant::now();

    run_pass(&port, &mut eval, STANDBY, t0);
    assert!(port.commands().is_empty());

    // Threshold reached exactly: command fires.
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(60));
    assert_eq!(
        port.commands(),
        vec![(r"\\.\PhysicalDrive0".to_string(), STANDBY)]
    );

    // Still idle on later passes: no re-issuance.
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(120));
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(600));
    assert_eq!(port.commands().len(), 1);

    // Activity re-arms, then a fresh idle episode fires again.
    let t_active = t0 + Duration::from_secs(650);
    port.set_device(0, DeviceScript::managed(8, 7));
    run_pass(&port, &mut eval, STANDBY, t_active);
    assert_eq!(port.commands().len(), 1);

    run_pass(&port, &mut eval, STANDBY, t_active + Duration::from_secs(60));
    assert_eq!(port.commands().len(), 2);
}

#[test]
fn command_failure_still_marks_record_spun_down() {
    let port = ScriptedPort::with_devices(vec![DeviceScript::managed(7, 7)]);
    port.fail_spin_down.set(true);
    let mut eval = evaluator(60);
    let t0 = Instant::now();

    run_pass(&port, &mut eval, STANDBY, t0);
    let summary = run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(60));
    assert_eq!(summary.spun_down, 1);

    let record = eval.registry().get(r"\\.\PhysicalDrive0").unwrap();
    assert!(record.spun_down);

    // Optimistic state: the rejected command is not retried next pass.
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(120));
    assert_eq!(port.commands().len(), 1);
}

#[test]
fn asleep_device_is_marked_without_any_command() {
    let port = ScriptedPort::with_devices(vec![DeviceScript::managed(7, 7)]);
    let mut eval = evaluator(60);
    let t0 = Instant::now();

    run_pass(&port, &mut eval, STANDBY, t0);

    port.set_device(
        0,
        DeviceScript {
            probe: ProbeOutcome::AlreadyAsleep,
            sample: None,
        },
    );
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(5));

    let record = eval.registry().get(r"\\.\PhysicalDrive0").unwrap();
    assert!(record.spun_down);
    assert!(port.commands().is_empty());
    assert_eq!(port.sample_calls.get(), 1);
}

#[test]
fn sample_failure_skips_device_for_the_pass_only() {
    let port = ScriptedPort::with_devices(vec![DeviceScript {
        probe: ProbeOutcome::Managed,
        sample: None,
    }]);
    let mut eval = evaluator(60);
    let t0 = Instant::now();

    let summary = run_pass(&port, &mut eval, STANDBY, t0);
    assert_eq!(summary.skipped, 1);
    assert!(eval.registry().is_empty());

    // The next pass acts as the retry.
    port.set_device(0, DeviceScript::managed(1, 1));
    let summary = run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(5));
    assert_eq!(summary.evaluated, 1);
    assert_eq!(eval.registry().len(), 1);
}

#[test]
fn configured_command_choice_is_dispatched() {
    let port = ScriptedPort::with_devices(vec![DeviceScript::managed(7, 7)]);
    let mut eval = evaluator(60);
    let t0 = Instant::now();

    run_pass(&port, &mut eval, SpinDownCommand::IdleImmediate, t0);
    run_pass(
        &port,
        &mut eval,
        SpinDownCommand::IdleImmediate,
        t0 + Duration::from_secs(60),
    );

    assert_eq!(
        port.commands(),
        vec![(
            r"\\.\PhysicalDrive0".to_string(),
            SpinDownCommand::IdleImmediate
        )]
    );
}

#[test]
fn named_rule_threshold_applies_to_matching_device() {
    let mut rules = RuleTable::new(Duration::from_secs(600));
    rules.add_rule(r"\\.\PhysicalDrive1", Duration::from_secs(30));
    let mut eval = IdleEvaluator::new(rules);

    let port = ScriptedPort::with_devices(vec![
        DeviceScript::managed(1, 1),
        DeviceScript::managed(2, 2),
    ]);
    let t0 = Instant::now();

    run_pass(&port, &mut eval, STANDBY, t0);
    run_pass(&port, &mut eval, STANDBY, t0 + Duration::from_secs(30));

    // Only the specifically configured disk crossed its threshold.
    assert_eq!(
        port.commands(),
        vec![(r"\\.\PhysicalDrive1".to_string(), STANDBY)]
    );
}
