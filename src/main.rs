//! reelsift - Find duplicate and visually similar videos.
//!
//! Usage:
//!   reelsift duplicates [PATH]   Find byte-identical videos
//!   reelsift similar [PATH]      Find similar videos by metadata and frames
//!   reelsift --help              Show help

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use reelsift_core::{DetectionConfig, DetectionProgress, ProgressCallback};
use reelsift_detect::{DetectionEngine, DetectionMode, SimilarityOptions};
use reelsift_media::FfprobeProbe;
use reelsift_scan::{LibraryScan, LibraryScanner, ScanConfig, ScanProgress};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(
    name = "reelsift",
    version,
    about = "Find duplicate and visually similar videos",
    long_about = "reelsift scans a video library, groups byte-identical files and \
                  scores the remaining files for similarity by duration, resolution, \
                  size and sampled frames.\n\n\
                  Frame sampling and probing need `ffmpeg` and `ffprobe` on PATH."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find byte-identical videos
    Duplicates {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Find similar videos
    Similar {
        #[command(flatten)]
        common: CommonArgs,

        /// Minimum overall similarity, 0.0 to 1.0
        #[arg(short, long, default_value = "0.8")]
        threshold: f64,

        /// Ignore duration when scoring
        #[arg(long)]
        no_duration: bool,

        /// Ignore resolution when scoring
        #[arg(long)]
        no_resolution: bool,

        /// Ignore file size when scoring
        #[arg(long)]
        no_size: bool,

        /// Skip frame extraction and visual comparison
        #[arg(long)]
        no_visual: bool,

        /// Maximum concurrent fingerprint extractions
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Library directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Glob patterns to skip (repeatable)
    #[arg(short, long = "ignore")]
    ignore: Vec<String>,

    /// TOML file with detection settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Duplicates { common } => run_duplicates(common).await,
        Command::Similar {
            common,
            threshold,
            no_duration,
            no_resolution,
            no_size,
            no_visual,
            concurrency,
        } => {
            let options = SimilarityOptions {
                threshold,
                check_duration: !no_duration,
                check_resolution: !no_resolution,
                check_file_size: !no_size,
                check_visual: !no_visual,
            };
            run_similar(common, options, concurrency).await
        }
    }
}

/// Log to stderr so JSON on stdout stays clean.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Load detection settings from `path`, or defaults.
fn load_config(path: Option<&Path>) -> Result<DetectionConfig> {
    let Some(path) = path else {
        return Ok(DetectionConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: DetectionConfig = toml::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config.validated()?)
}

async fn scan_library(common: &CommonArgs, config: &DetectionConfig) -> Result<LibraryScan> {
    eprintln!("Scanning {}...", common.path.display());

    let scan_config = ScanConfig::builder()
        .root(common.path.clone())
        .recursive(common.recursive)
        .ignore_patterns(common.ignore.clone())
        .probe_concurrency(config.probe_concurrency)
        .build()
        .context("Invalid scan settings")?;

    let scanner = LibraryScanner::new(Arc::new(FfprobeProbe::new()));
    let progress = show_probe_progress(scanner.subscribe());
    let scan = scanner.scan(&scan_config).await;
    // Closing the channel lets the progress task drain and exit.
    drop(scanner);
    let _ = progress.await;
    let scan = scan.context("Scan failed")?;

    eprintln!(
        "Found {} videos ({}) in {:.2}s",
        scan.files.len(),
        format_size(scan.total_size()),
        scan.scan_duration.as_secs_f64()
    );
    if !scan.warnings.is_empty() {
        eprintln!("{} warning(s) during scan", scan.warnings.len());
    }
    Ok(scan)
}

/// Print probe progress on one stderr line until the scan completes.
fn show_probe_progress(mut rx: broadcast::Receiver<ScanProgress>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(progress) => {
                    eprint!(
                        "\r Probing {}/{} ({:.1} files/s, {} failed)",
                        progress.files_probed,
                        progress.files_found,
                        progress.files_per_second(),
                        progress.probe_failures
                    );
                    let _ = std::io::stderr().flush();
                    if progress.is_complete() {
                        eprintln!();
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Cancel the active run of `mode` on Ctrl-C.
fn cancel_on_interrupt(
    engine: &Arc<DetectionEngine>,
    mode: DetectionMode,
) -> tokio::task::JoinHandle<()> {
    let engine = Arc::clone(engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Interrupted, finishing current work...");
            engine.cancel(mode);
        }
    })
}

/// Single-line progress display on stderr.
fn progress_line() -> ProgressCallback {
    Arc::new(|p: &DetectionProgress| {
        let item = p.current_item.as_deref().unwrap_or("");
        eprint!(
            "\r {:<24} {:>3}% {:<40}",
            p.phase.to_string(),
            p.percentage,
            truncate(item, 40)
        );
        let _ = std::io::stderr().flush();
    })
}

/// Run duplicate detection.
async fn run_duplicates(common: CommonArgs) -> Result<()> {
    let config = load_config(common.config.as_deref())?;
    let scan = scan_library(&common, &config).await?;

    let engine = Arc::new(DetectionEngine::with_ffmpeg(config)?);
    let interrupt = cancel_on_interrupt(&engine, DetectionMode::Duplicates);
    let report = engine
        .detect_duplicates(scan.files, Some(progress_line()))
        .await?;
    interrupt.abort();
    eprintln!();
    info!(groups = report.group_count(), "duplicate run complete");

    match common.format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate Video Report");
            println!("{}", "─".repeat(70));
            println!();

            if report.cancelled {
                println!(" Cancelled, results are partial.");
                println!();
            }

            if report.groups.is_empty() {
                println!(" No duplicate videos found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.group_count(),
                    report.total_duplicates
                );
                println!(" Total wasted space: {}", format_size(report.total_waste_size));
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted)",
                        i + 1,
                        group.count(),
                        format_size(group.representative.size),
                        format_size(group.waste_size)
                    );
                    for file in &group.files {
                        let marker = if file.path == group.representative.path {
                            "*"
                        } else {
                            " "
                        };
                        println!("  {} {}", marker, file.path.display());
                    }
                    println!();
                }
                println!(" * oldest copy");
            }
            println!(" Completed in {:.2}s", report.scan_time_ms as f64 / 1000.0);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Run similarity detection.
async fn run_similar(
    common: CommonArgs,
    options: SimilarityOptions,
    concurrency: Option<usize>,
) -> Result<()> {
    let mut config = load_config(common.config.as_deref())?;
    if let Some(concurrency) = concurrency {
        config.fingerprint_concurrency = concurrency;
    }
    let scan = scan_library(&common, &config).await?;

    let engine = Arc::new(DetectionEngine::with_ffmpeg(config)?);
    let interrupt = cancel_on_interrupt(&engine, DetectionMode::Similarity);
    let report = engine
        .detect_similar(scan.files, options, Some(progress_line()))
        .await?;
    interrupt.abort();
    eprintln!();
    info!(groups = report.group_count(), "similarity run complete");

    match common.format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Similar Video Report (threshold {:.0}%)", report.threshold * 100.0);
            println!("{}", "─".repeat(70));
            println!();

            if report.cancelled {
                println!(" Cancelled, results are partial.");
                println!();
            }

            if report.groups.is_empty() {
                println!(" No similar videos found.");
            } else {
                println!(
                    " Found {} similar groups ({} files)",
                    report.group_count(),
                    report.total_similar_files
                );
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {:.1}% similar)",
                        i + 1,
                        group.count(),
                        group.average_similarity * 100.0
                    );
                    for file in &group.files {
                        let label = file
                            .resolution_label()
                            .map(|l| l.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        let duration = file
                            .duration_secs
                            .map(format_duration)
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "   {:<50} {:>10} {:>7} {:>9}",
                            truncate(&file.path.display().to_string(), 50),
                            format_size(file.size),
                            label,
                            duration
                        );
                    }
                    println!();
                }
            }
            println!(" Completed in {:.2}s", report.scan_time_ms as f64 / 1000.0);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Format seconds as `h:mm:ss` or `m:ss`.
fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Truncate a string to max length, keeping the tail.
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max_len - 1)).collect();
        format!("…{tail}")
    }
}
