//! dirfan - bounded, cancellable fan-out directory scanner.
//!
//! Usage:
//!   dirfan scan [PATH]       Scan with a worker pool and show a summary
//!   dirfan linear [PATH]     Scan one directory at a time
//!   dirfan compare [PATH]    Run both scans and compare timings
//!   dirfan --help            Show help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dirfan_core::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, ScanConfig, ScanReport};
use dirfan_scan::{FanoutScanner, LinearScanner};

/// Number of warnings listed under a text summary.
const WARNINGS_SHOWN: usize = 10;

#[derive(Parser)]
#[command(
    name = "dirfan",
    version,
    about = "Bounded, cancellable fan-out directory scanner",
    long_about = "dirfan enumerates every directory under a root and hands them to a \
                  fixed pool of workers through a bounded queue.\n\n\
                  Press Ctrl-C once to stop gracefully, twice to exit immediately."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan with a pool of workers fed through a bounded queue
    Scan {
        #[command(flatten)]
        target: Target,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan one directory at a time on a single thread
    Linear {
        #[command(flatten)]
        target: Target,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the linear and fan-out scans back to back and compare timings
    Compare {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct Target {
    /// Path to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum number of directories buffered ahead of the workers
    #[arg(short, long = "queue", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,

    /// Skip the files directly inside PATH and only scan its subdirectories
    #[arg(long)]
    no_root: bool,
}

impl Target {
    fn config(&self) -> Result<ScanConfig> {
        let root = self.path.canonicalize().context("Invalid path")?;
        ScanConfig::builder()
            .root(root)
            .workers(self.workers)
            .queue_capacity(self.queue_capacity)
            .skip_hidden(!self.include_hidden)
            .include_root(!self.no_root)
            .build()
            .context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let report = match cli.command {
        Command::Scan { target, json } => {
            let config = target.config()?;
            let report = run_fanout(&config, &cancel, !json).await?;
            if json {
                print_json(&report)?;
            } else {
                print_summary("Fan-out scan", &config, &report);
            }
            report
        }
        Command::Linear { target, json } => {
            let config = target.config()?;
            let report = run_linear(&config, &cancel).await?;
            if json {
                print_json(&report)?;
            } else {
                print_summary("Linear scan", &config, &report);
            }
            report
        }
        Command::Compare { target } => {
            let config = target.config()?;
            run_compare(&config, &cancel).await?
        }
    };

    Ok(if report.is_cancelled() {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    })
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("dirfan=debug,warn")
        } else {
            EnvFilter::new("dirfan=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// First Ctrl-C raises the token, the second exits on the spot.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\nInterrupt received, shutting down gracefully...");
        eprintln!("Press Ctrl+C again to force exit immediately.");
        warn!("Cancellation requested");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nForced exit!");
            std::process::exit(130);
        }
    });
}

async fn run_fanout(
    config: &ScanConfig,
    cancel: &CancellationToken,
    show_progress: bool,
) -> Result<ScanReport> {
    let scanner = FanoutScanner::new();

    let progress_task = show_progress.then(|| {
        let mut progress_rx = scanner.subscribe();
        tokio::spawn(async move {
            loop {
                match progress_rx.recv().await {
                    Ok(progress) => eprint!(
                        "\r  {}/{} dirs, {} files, {} queued, {:.0} files/s   ",
                        progress.dirs_scanned,
                        progress.dirs_enumerated,
                        progress.files_processed,
                        progress.queue_len,
                        progress.files_per_second()
                    ),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    eprintln!("Scanning {}...", config.root.display());
    let result = scanner.scan(config, Some(cancel.clone())).await;

    // Dropping the scanner closes the progress channel
    drop(scanner);
    if let Some(task) = progress_task {
        let _ = task.await;
        eprintln!();
    }

    result.context("Scan failed")
}

async fn run_linear(config: &ScanConfig, cancel: &CancellationToken) -> Result<ScanReport> {
    eprintln!("Scanning {} (linear)...", config.root.display());

    let config = config.clone();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || LinearScanner::new().scan(&config, &cancel))
        .await
        .context("Linear scan task failed")?
        .context("Scan failed")
}

async fn run_compare(config: &ScanConfig, cancel: &CancellationToken) -> Result<ScanReport> {
    let linear = run_linear(config, cancel).await?;
    print_summary("Linear scan", config, &linear);
    if linear.is_cancelled() {
        return Ok(linear);
    }

    let fanout = run_fanout(config, cancel, true).await?;
    print_summary("Fan-out scan", config, &fanout);
    if fanout.is_cancelled() {
        return Ok(fanout);
    }

    let fanout_secs = fanout.duration.as_secs_f64();
    let speedup = if fanout_secs > 0.0 {
        linear.duration.as_secs_f64() / fanout_secs
    } else {
        0.0
    };
    info!(speedup, workers = config.workers, "Comparison finished");

    println!(" Speedup with {} workers: {:.2}x", config.workers, speedup);
    if linear.stats.files_seen() != fanout.stats.files_seen() {
        println!(
            " File counts differ: {} linear vs {} fan-out (tree changed during the run?)",
            linear.stats.files_seen(),
            fanout.stats.files_seen()
        );
    }

    Ok(fanout)
}

fn print_json(report: &ScanReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn print_summary(title: &str, config: &ScanConfig, report: &ScanReport) {
    let stats = &report.stats;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {title} - {}", config.root.display());
    println!(
        " {} files in {} of {} directories",
        stats.files_processed, stats.dirs_scanned, stats.dirs_enumerated
    );
    if stats.dirs_partial > 0 {
        println!(" {} directories left partially scanned", stats.dirs_partial);
    }
    if stats.entries_skipped > 0 {
        println!(" {} unreadable entries skipped", stats.entries_skipped);
    }
    println!(
        " {} ({:.2}s, {:.0} files/s)",
        report.outcome,
        report.duration.as_secs_f64(),
        report.files_per_second()
    );
    println!("{}", "─".repeat(60));

    if stats.errors() > 0 {
        println!();
        println!(
            "{} error(s): {} files failed, {} directories unreadable",
            stats.errors(),
            stats.files_failed,
            stats.listing_failures
        );
    }
    if !report.warnings.is_empty() {
        println!();
        for warning in report.warnings.iter().take(WARNINGS_SHOWN) {
            println!("  {}: {}", warning.path.display(), warning.message);
        }
        if report.warnings.len() > WARNINGS_SHOWN {
            println!("  ... and {} more", report.warnings.len() - WARNINGS_SHOWN);
        }
    }
}
