use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use hx_scan_rs::config::ScanConfig;
use hx_scan_rs::report::{self, ConsoleReporter};
use hx_scan_rs::scanner::{AutoGate, RescanGate, Scanner, StdinGate};
use hx_scan_rs::sink::FileSinks;
use hx_scan_rs::types::ScanSummary;
use hx_scan_rs::{logging, targets};

/// hx-scan-rs: fast async HTTP status prober for IP, domain and URL lists.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hx-scan-rs",
    version,
    about = "Fast async HTTP status prober for IP, domain and URL lists, with failure re-scan and a basic CORS check.",
    long_about = None
)]
struct Cli {
    /// File with one target (IP, domain or URL) per line.
    #[arg(short = 'i', long, visible_short_alias = 'f')]
    input: PathBuf,

    /// Number of concurrent workers. Defaults to the CPU count, at least 4.
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Per-request timeout in milliseconds.
    #[arg(short = 't', long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Only print CORS findings, errors and summaries.
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,

    /// Run an OPTIONS-based CORS check on every target that responds.
    #[arg(long, default_value_t = false)]
    cors: bool,

    /// Debug-level diagnostics on stderr.
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,

    /// Directory for categorized results. Defaults to `<input stem>_output`.
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Write the final summary as pretty JSON to this path (optional).
    #[arg(long)]
    json: Option<PathBuf>,

    /// Re-scan failed targets without asking.
    #[arg(short = 'y', long, default_value_t = false, conflicts_with = "no_rescan")]
    yes: bool,

    /// Never re-scan failed targets.
    #[arg(long = "no-rescan", default_value_t = false)]
    no_rescan: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose)?;
    report::print_banner();

    let config = ScanConfig::new(
        cli.workers.unwrap_or_else(ScanConfig::default_workers),
        Duration::from_millis(cli.timeout_ms),
        cli.cors,
        cli.quiet,
    )?;
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(targets::default_output_dir(&cli.input)));

    println!("hx-scan-rs configuration:");
    println!("  input        : {}", cli.input.display());
    println!("  workers      : {}", config.workers);
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  cors_check   : {}", config.cors_check);
    println!("  output_dir   : {}", output_dir.display());
    println!(
        "  json         : {}",
        cli.json
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    let list = targets::load_targets_from_path(&cli.input)?;
    if list.is_empty() {
        println!(
            "{}",
            format!("[!] No targets found in {}", cli.input.display()).yellow()
        );
        return Ok(());
    }
    println!("[*] Loaded {} targets", list.len());

    let sinks = FileSinks::create(&output_dir)?;
    let reporter = ConsoleReporter::new(config.quiet);
    let scanner = Scanner::http(config, Arc::new(sinks), Arc::new(reporter))?;

    let gate: Box<dyn RescanGate> = if cli.yes {
        Box::new(AutoGate(true))
    } else if cli.no_rescan {
        Box::new(AutoGate(false))
    } else {
        Box::new(StdinGate)
    };

    let summary = scanner.run(&list, gate.as_ref()).await?;
    report::print_final_summary(&summary, &output_dir);

    if let Some(path) = cli.json.as_deref() {
        if let Err(e) = write_summary_json(path, &summary) {
            eprintln!("Failed to write JSON to {}: {e:#}", path.display());
        } else {
            println!("Wrote JSON summary to {}", path.display());
        }
    }

    Ok(())
}

fn write_summary_json(path: &Path, summary: &ScanSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
