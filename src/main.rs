//! Challenge Harvester main entry point
//!
//! This is the command-line interface for the challenge harvester.

use anyhow::Context;
use challenge_harvester::config::{load_config_with_hash, validate, Config};
use challenge_harvester::harvester::{plan_windows, run_harvest};
use challenge_harvester::output::print_statistics;
use challenge_harvester::Status;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that finished with skipped probes or unfetched tasks
const EXIT_INCOMPLETE: u8 = 2;

/// Challenge Harvester: bulk collection of a paginated challenge catalog
///
/// Splits the requested range into yearly windows, fetches every listing
/// page with round-based retries, and optionally fetches each challenge's
/// registrant list under a rate-limited batching discipline.
#[derive(Parser, Debug)]
#[command(name = "challenge-harvester")]
#[command(version)]
#[command(about = "Bulk harvester for a paginated challenge catalog", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Earliest challenge end date (YYYY-MM-DD or RFC 3339); defaults to the config, then yesterday
    #[arg(short, long)]
    since: Option<String>,

    /// Latest challenge start date (YYYY-MM-DD or RFC 3339); defaults to the config, then today
    #[arg(short, long)]
    to: Option<String>,

    /// Status filter ("ALL" or a catalog status such as "Completed")
    #[arg(long)]
    status: Option<Status>,

    /// Also fetch each challenge's registrant list
    #[arg(long)]
    with_sub_resources: bool,

    /// Directory for the harvested files (created if missing)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum number of rounds per stage
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the query windows without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration after command-line overrides")?;

    if cli.dry_run {
        handle_dry_run(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = run_harvest(config, Some(config_hash)).await?;

    if !cli.quiet {
        print_statistics(&report);
    }

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(
            "Harvest incomplete: {} failed probes, {} of {} pages fetched",
            report.failed_probes(),
            report.pages.fetched,
            report.pages.planned
        );
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

/// Applies command-line values on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(since) = &cli.since {
        config.range.since = since.clone();
    }
    if let Some(to) = &cli.to {
        config.range.to = to.clone();
    }
    if let Some(status) = cli.status {
        config.catalog.status = status;
    }
    if cli.with_sub_resources {
        config.harvester.with_sub_resources = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(max_rounds) = cli.max_rounds {
        config.harvester.max_rounds = max_rounds;
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("challenge_harvester=info,warn"),
            1 => EnvFilter::new("challenge_harvester=debug,info"),
            2 => EnvFilter::new("challenge_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the windows that would be probed
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Challenge Harvester Dry Run ===\n");

    let (since, to) = config.range.bounds()?;
    println!("Range: {} .. {}", since.to_rfc3339(), to.to_rfc3339());
    println!("Status: {}", config.catalog.status);
    println!("Output: {}", config.output.directory.display());
    println!(
        "Sub-resources: {} (batch size {}, delay {}ms)",
        config.harvester.with_sub_resources,
        config.harvester.batch_size,
        config.harvester.batch_delay_ms
    );
    println!("Max rounds: {}\n", config.harvester.max_rounds);

    let windows = plan_windows(config)?;

    println!("Windows ({}):", windows.len());
    for window in &windows {
        println!(
            "  - {}: {} .. {}",
            window.year,
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        );
        println!("    {}", window.query_template);
    }

    Ok(())
}
