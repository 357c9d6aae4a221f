//! Harvest engine
//!
//! This module contains the fetch orchestration, run stage by stage:
//! 1. Partition the range into yearly windows
//! 2. Probe every window for its page count
//! 3. Fetch every page in retry rounds, collecting sub-resource tasks
//! 4. Fetch sub-resources in rate-limited batches, retrying in waves

mod batching;
mod collector;
mod context;
mod discovery;
mod sub_resource;

pub use batching::{plan_batches, Batch};
pub use collector::{collect_pages, fetch_page, CollectorOutput, FetchedPage};
pub use context::{listing_query, plan_windows, HarvestContext};
pub use discovery::discover;
pub use sub_resource::{fetch_sub_resource, fetch_sub_resources, FetchedList};

use crate::config::Config;
use crate::output::{generate_markdown_summary, HarvestReport, WindowSummary};
use crate::HarvestError;
use chrono::Utc;

/// Runs every stage of a harvest with an existing context
///
/// # Returns
///
/// * `Ok(HarvestReport)` - The run finished; check [`HarvestReport::is_complete`]
/// * `Err(HarvestError)` - A fatal error aborted the run
pub async fn harvest(ctx: &HarvestContext) -> Result<HarvestReport, HarvestError> {
    let mut report = HarvestReport::new(Utc::now());

    let windows = ctx.windows()?;
    tracing::info!("Harvesting {} windows", windows.len());

    let plans = discover(ctx, windows).await?;
    report.windows = plans.iter().map(WindowSummary::from).collect();

    let collected = collect_pages(ctx, &plans).await?;
    report.pages = collected.stats;
    report.items_fetched = collected.items_fetched;
    report.missing_legacy_id = collected.missing_legacy_id;

    if ctx.config.harvester.with_sub_resources {
        report.sub_resources = Some(fetch_sub_resources(ctx, collected.sub_tasks).await?);
    } else {
        tracing::info!(
            "Skipping {} sub-resource tasks (sub-resources not requested)",
            collected.sub_tasks.len()
        );
    }

    report.finished_at = Some(Utc::now());
    Ok(report)
}

/// Runs a complete harvest for a configuration
///
/// The context, and with it the HTTP client, lives exactly as long as this
/// call. The markdown summary is written into the output directory.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, recorded in the summary
///
/// # Example
///
/// ```no_run
/// use challenge_harvester::config::load_config_with_hash;
/// use challenge_harvester::harvester::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let report = run_harvest(config, Some(hash)).await?;
/// println!("{} pages fetched", report.pages.fetched);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    config_hash: Option<String>,
) -> Result<HarvestReport, HarvestError> {
    let summary_path = config.output.directory.join(&config.output.summary_file);
    let ctx = HarvestContext::new(config)?;

    let mut report = harvest(&ctx).await?;
    drop(ctx);

    report.config_hash = config_hash;
    generate_markdown_summary(&report, &summary_path)?;
    tracing::info!("Summary written to {}", summary_path.display());

    Ok(report)
}
