/*!
 * Vigil CLI - replica store integrity auditor
 */

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::warn;
use vigil::{
    config::{AuditConfig, LogLevel},
    core::{run_once, run_service, ReplicaFileOpener, ReportWindow, ShutdownHandle, Sweeper, SystemMounts},
    error::{Result, VigilError, EXIT_SUCCESS},
    logging,
    report::{ReportLog, ReportStats},
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version, about = "Integrity auditing daemon for sharded on-disk replica stores", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Devices root to scan
    #[arg(long, value_name = "DIR", global = true)]
    devices: Option<PathBuf>,

    /// Shard root under each device
    #[arg(long, value_name = "NAME", global = true)]
    data_dir: Option<String>,

    /// Disable the mount-point guard
    #[arg(long = "no-mount-check", global = true)]
    no_mount_check: bool,

    /// Seconds between sweep starts in service mode
    #[arg(long, value_name = "SECS", global = true)]
    interval: Option<u64>,

    /// Seconds between interim count reports during long sweeps
    #[arg(long, value_name = "SECS", global = true)]
    reporting_interval: Option<u64>,

    /// Maximum units audited per second (0 = unlimited)
    #[arg(long, value_name = "N", global = true)]
    max_units_per_second: Option<u32>,

    /// Number of audit worker threads (0 = sequential)
    #[arg(long, value_name = "N", global = true)]
    workers: Option<usize>,

    /// Path to the JSON Lines report log
    #[arg(long, value_name = "PATH", global = true)]
    report_log: Option<PathBuf>,

    /// Log file path (default: stderr)
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auditor as a long-lived service
    Run,

    /// Perform exactly one audit pass and exit
    Sweep,

    /// Write a configuration file with the effective settings
    Init {
        /// Destination for the generated config
        #[arg(value_name = "PATH", default_value = "vigil.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Summarize a JSON Lines report log
    Stats {
        /// Report log to read (defaults to the configured report_log)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => AuditConfig::from_file(path)?,
        None => AuditConfig::default(),
    };

    // Override config with CLI arguments
    if let Some(devices) = cli.devices {
        config.devices = devices;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.no_mount_check {
        config.mount_check = false;
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(secs) = cli.reporting_interval {
        config.reporting_interval_secs = secs;
    }
    if let Some(rate) = cli.max_units_per_second {
        config.max_units_per_second = rate;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(path) = cli.report_log {
        config.report_log = Some(path);
    }
    if let Some(path) = cli.log {
        config.log_file = Some(path);
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.verbose {
        config.verbose = true;
    }
    config.validate()?;

    match cli.command {
        Commands::Init { path, force } => handle_init(&config, &path, force),
        Commands::Stats { path } => handle_stats(&config, path),
        Commands::Sweep => {
            init_logging(&config);
            audit(&config, false)
        }
        Commands::Run => {
            init_logging(&config);
            audit(&config, true)
        }
    }
}

fn init_logging(config: &AuditConfig) {
    if let Err(e) = logging::init_logging(config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
}

fn audit(config: &AuditConfig, service: bool) -> Result<()> {
    let shutdown = ShutdownHandle::new();
    let signal_handle = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || signal_handle.request()) {
        warn!(error = %err, "could not install signal handler; interrupts will not drain cleanly");
    }

    let report = match config.report_log {
        Some(ref path) => Some(ReportLog::open(path)?),
        None => None,
    };
    let window = ReportWindow::new(config.reporting_interval());
    let opener = ReplicaFileOpener;
    let mounts = SystemMounts;
    let sweeper = Sweeper::new(
        config,
        &opener,
        &mounts,
        &window,
        &shutdown,
        report.as_ref(),
    );

    if service {
        run_service(&sweeper, config.interval(), &shutdown);
    } else {
        let stats = run_once(&sweeper)?;
        println!(
            "Audit pass complete: {} passed, {} failed, {} tombstones skipped in {:.2}s",
            stats.passes,
            stats.failures,
            stats.skipped,
            stats.elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn handle_init(config: &AuditConfig, path: &PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(VigilError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config.to_file(path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

fn handle_stats(config: &AuditConfig, path: Option<PathBuf>) -> Result<()> {
    let path = path.or_else(|| config.report_log.clone()).ok_or_else(|| {
        VigilError::Config("no report log configured; pass a path or set report_log".to_string())
    })?;
    let stats = ReportStats::from_report_log(&path)?;
    stats.print();
    Ok(())
}
