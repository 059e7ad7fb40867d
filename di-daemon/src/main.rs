//! diskidled
//!
//! Daemon that spins down disks after a configurable idle period. Disk
//! activity is judged from the cumulative read/write counters the storage
//! stack keeps per physical drive, so short self-wakes that do no I/O are
//! not counted as activity.
//!
//! Per-disk timeouts follow the classic flag grammar: `-i SECS` before any
//! `-a DISK` sets the default timeout, `-i` after an `-a` applies to that
//! disk only.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use di_core::{run_pass, DaemonConfig, IdleEvaluator, RuleTable, SpinDownCommand};
use di_platform::native_port;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global shutdown flag for clean termination
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Granularity of the shutdown check while sleeping between passes.
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, PartialEq)]
enum Invocation {
    Help,
    Version,
    /// One-shot: stop the named disk and exit.
    Stop(String),
    Run(Options),
}

#[derive(Debug, PartialEq)]
struct Options {
    debug: bool,
    config: Option<PathBuf>,
    /// Default idle timeout in seconds; `Some` only when set with `-i`
    /// before any `-a`, so a config file default is not clobbered.
    default_idle: Option<u64>,
    /// Per-disk rules in flag order, (disk, idle seconds).
    rules: Vec<(String, u64)>,
}

impl Options {
    fn new() -> Self {
        Self {
            debug: false,
            config: None,
            default_idle: None,
            rules: Vec::new(),
        }
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut opts = Options::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "-v" | "--version" => return Ok(Invocation::Version),
            "-d" => opts.debug = true,
            "-t" => {
                i += 1;
                let disk = args
                    .get(i)
                    .ok_or_else(|| "-t requires a disk argument".to_string())?;
                return Ok(Invocation::Stop(disk.clone()));
            }
            "-C" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "-C requires a file argument".to_string())?;
                opts.config = Some(PathBuf::from(path));
            }
            "-a" => {
                i += 1;
                let disk = args
                    .get(i)
                    .ok_or_else(|| "-a requires a disk argument".to_string())?;
                // Rule starts at the current default until an `-i` follows.
                let idle = opts
                    .default_idle
                    .unwrap_or(di_core::constants::idle::SHIPPED_DEFAULT_IDLE_SECS);
                opts.rules.push((disk.clone(), idle));
            }
            "-i" => {
                i += 1;
                let secs: u64 = args
                    .get(i)
                    .ok_or_else(|| "-i requires a seconds argument".to_string())?
                    .parse()
                    .map_err(|_| format!("invalid idle time: {}", args[i]))?;
                match opts.rules.last_mut() {
                    Some(rule) => rule.1 = secs,
                    None => opts.default_idle = Some(secs),
                }
            }
            arg => return Err(format!("unknown argument: {arg}")),
        }
        i += 1;
    }

    Ok(Invocation::Run(opts))
}

fn print_help() {
    eprintln!("diskidled {VERSION} - idle disk spin-down daemon");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    diskidled [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -a DISK         Add a per-disk rule (e.g. \\\\.\\PhysicalDrive1)");
    eprintln!("    -i SECS        Idle timeout: default if before any -a, else for the last -a disk");
    eprintln!("    -t DISK         Spin down the named disk immediately and exit");
    eprintln!("    -C FILE         Load configuration from a JSON file");
    eprintln!("    -d              Debug logging");
    eprintln!("    -v, --version   Print version");
    eprintln!("    -h, --help      Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    DISKIDLE_LOG    Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("diskidled {VERSION}");
}

// ============================================================================
// Startup
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "debug".to_string()
    } else {
        std::env::var("DISKIDLE_LOG").unwrap_or_else(|_| "info".to_string())
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&filter)
        .init();
}

/// Merge the config file (if any) with command-line rules. Flags win over
/// the file: a `-i` default overrides the file default, and flag rules are
/// appended after file rules so a flag rule for a new disk still applies.
fn build_rules(opts: &Options) -> anyhow::Result<(RuleTable, SpinDownCommand)> {
    let (mut table, command) = match &opts.config {
        Some(path) => {
            let config = DaemonConfig::load(path)?;
            info!(config = %path.display(), "configuration loaded");
            (config.to_rule_table(), config.command)
        }
        None => (
            RuleTable::new(Duration::from_secs(
                di_core::constants::idle::SHIPPED_DEFAULT_IDLE_SECS,
            )),
            SpinDownCommand::default(),
        ),
    };

    if let Some(secs) = opts.default_idle {
        table.set_default(Duration::from_secs(secs));
    }
    for (disk, secs) in &opts.rules {
        table.add_rule(disk, Duration::from_secs(*secs));
    }

    Ok((table, command))
}

// ============================================================================
// One-Shot Stop
// ============================================================================

/// Spin down one disk right now. Failures are reported but do not change
/// the exit status; the disk may simply be absent or already asleep.
fn stop_disk(disk: &str) {
    use di_core::DiskPort;

    let port = native_port();
    info!(%disk, "sending stop unit");
    match port.stop_unit(disk) {
        Ok(()) => info!(%disk, "disk stopped"),
        Err(e) => error!(%disk, error = %e, "could not stop disk"),
    }
}

// ============================================================================
// Poll Loop
// ============================================================================

fn run_daemon(opts: &Options) -> anyhow::Result<()> {
    let (rules, command) = build_rules(opts)?;

    let interval = rules.sleep_interval();
    info!(
        "diskidled {} starting, default idle {}s, {} rule(s), polling every {}s",
        VERSION,
        rules.default_timeout().as_secs(),
        rules.rules().len(),
        interval.as_secs()
    );
    for rule in rules.rules() {
        debug!(disk = %rule.name, idle_secs = rule.idle_timeout.as_secs(), "rule");
    }

    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    })?;

    let port = native_port();
    let mut evaluator = IdleEvaluator::new(rules);

    while !SHUTDOWN.load(Ordering::SeqCst) {
        let summary = run_pass(&port, &mut evaluator, command, Instant::now());
        debug!(
            probed = summary.probed,
            evaluated = summary.evaluated,
            spun_down = summary.spun_down,
            skipped = summary.skipped,
            "pass complete"
        );

        // Sleep in short slices so a signal ends the daemon promptly.
        let mut remaining = interval;
        while !remaining.is_zero() && !SHUTDOWN.load(Ordering::SeqCst) {
            let slice = remaining.min(SHUTDOWN_POLL);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }

    info!("shutdown requested, exiting");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {e}");
            print_help();
            std::process::exit(1);
        }
    };

    match invocation {
        Invocation::Help => print_help(),
        Invocation::Version => print_version(),
        Invocation::Stop(disk) => {
            init_logging(false);
            stop_disk(&disk);
        }
        Invocation::Run(opts) => {
            init_logging(opts.debug);
            if let Err(e) = run_daemon(&opts) {
                error!(error = %e, "daemon failed");
                std::process::exit(2);
            }
        }
    }
}
