//! Paginated collector: round-based fetching of every planned page
//!
//! Each round launches every pending page at once and waits for all of them
//! (a barrier, not a pipeline). Pages that fail transiently are re-queued
//! unchanged into the next round, up to the configured round limit.

use crate::catalog::{fetch_body, parse_items, SchemaError};
use crate::harvester::HarvestContext;
use crate::output::{RoundStats, SkippedTask, StageStats};
use crate::state::{PageTask, SubResourceTask, TaskOutcome, WindowPlan};
use crate::HarvestError;
use futures::future::join_all;

/// What a successfully fetched page contributed
#[derive(Debug, Default)]
pub struct FetchedPage {
    /// Entries in the page array, including the ones that failed to decode
    pub item_count: usize,
    pub sub_tasks: Vec<SubResourceTask>,
    pub missing_legacy_id: Vec<(String, i64)>,

    /// Entries that did not decode as an item; they get no sub-resource task
    pub invalid_items: Vec<SchemaError>,
}

/// Result of the page stage
#[derive(Debug, Default)]
pub struct CollectorOutput {
    pub stats: StageStats,
    pub items_fetched: usize,

    /// Sub-resource tasks from every written page, across all rounds
    pub sub_tasks: Vec<SubResourceTask>,

    pub missing_legacy_id: Vec<(String, i64)>,
}

/// Fetches, validates and writes one page
///
/// The body is written verbatim as long as it is a JSON array. Entries that
/// fail to decode are reported in [`FetchedPage::invalid_items`] and only
/// lose their sub-resource task. Only a failed write is returned as `Err`;
/// request and shape problems are reported through the outcome.
pub async fn fetch_page(
    ctx: &HarvestContext,
    task: &PageTask,
) -> Result<TaskOutcome<FetchedPage>, HarvestError> {
    let body = match fetch_body(&ctx.client, &task.url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("{} | failed fetch: {}", task, e);
            return Ok(TaskOutcome::Transient(e));
        }
    };

    let page = match parse_items(&body) {
        Ok(page) => page,
        Err(e) => {
            tracing::error!("{} | unexpected page body: {}", task, e);
            return Ok(TaskOutcome::Malformed(e));
        }
    };

    ctx.sink.write_page(task, &body)?;
    tracing::info!("{} | challenge list length: {}", task, page.raw_count);

    for e in &page.invalid {
        tracing::warn!("{} | skipping item: {}", task, e);
    }

    let mut fetched = FetchedPage {
        item_count: page.raw_count,
        invalid_items: page.invalid,
        ..FetchedPage::default()
    };

    for item in &page.items {
        if item.has_sub_resources() && item.legacy_id.is_none() {
            fetched
                .missing_legacy_id
                .push((item.id.clone(), item.num_of_registrants));
        }

        if let Some(sub_task) =
            SubResourceTask::from_item(item, task.year, task.page, &ctx.sub_resource_endpoint)?
        {
            fetched.sub_tasks.push(sub_task);
        }
    }

    Ok(TaskOutcome::Fetched(fetched))
}

/// Fetches every page of every plan
///
/// At least one round is always run, whatever `max_rounds` says. Every
/// planned page ends up either fetched, malformed, or permanently failed.
///
/// # Arguments
///
/// * `ctx` - The run context
/// * `plans` - Window plans from metadata discovery
///
/// # Returns
///
/// * `Ok(CollectorOutput)` - Statistics plus the sub-resource tasks to fetch next
/// * `Err(HarvestError)` - A page could not be written; the stage is aborted
pub async fn collect_pages(
    ctx: &HarvestContext,
    plans: &[WindowPlan],
) -> Result<CollectorOutput, HarvestError> {
    // Each pending task carries the error of its last failed attempt
    let mut pending: Vec<(PageTask, Option<String>)> = plans
        .iter()
        .flat_map(WindowPlan::page_tasks)
        .map(|task| (task, None))
        .collect();
    let max_rounds = ctx.config.harvester.max_rounds.max(1);

    let mut output = CollectorOutput {
        stats: StageStats::new(pending.len()),
        ..CollectorOutput::default()
    };
    let mut round = 0;

    while !pending.is_empty() && round < max_rounds {
        let attempted = pending.len();
        tracing::info!("Fetch round {}: {} pages", round, attempted);

        let results = join_all(pending.iter().map(|(task, _)| fetch_page(ctx, task))).await;

        let mut retry_queue = Vec::new();
        for ((task, _), result) in pending.into_iter().zip(results) {
            let outcome = result?;
            tracing::trace!("{} | {}", task, outcome.kind());

            match outcome {
                TaskOutcome::Fetched(page) => {
                    output.stats.fetched += 1;
                    output.items_fetched += page.item_count;
                    output.sub_tasks.extend(page.sub_tasks);
                    output.missing_legacy_id.extend(page.missing_legacy_id);
                    output
                        .stats
                        .invalid_records
                        .extend(page.invalid_items.into_iter().map(|e| SkippedTask {
                            task: task.to_string(),
                            reason: e.to_string(),
                        }));
                }
                TaskOutcome::Transient(e) => retry_queue.push((task, Some(e.to_string()))),
                TaskOutcome::Malformed(e) => output.stats.malformed.push(SkippedTask {
                    task: task.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        output.stats.rounds.push(RoundStats {
            round,
            attempted,
            failed: retry_queue.len(),
        });

        pending = retry_queue;
        round += 1;
    }

    if !pending.is_empty() {
        tracing::error!(
            "{} pages still failing after {} rounds",
            pending.len(),
            max_rounds
        );
        output.stats.permanently_failed = pending
            .into_iter()
            .map(|(task, reason)| SkippedTask {
                task: task.to_string(),
                reason: reason.unwrap_or_else(|| "not attempted".to_string()),
            })
            .collect();
    }

    tracing::info!(
        "Fetched {} of {} pages, {} sub-resource tasks",
        output.stats.fetched,
        output.stats.planned,
        output.sub_tasks.len()
    );

    Ok(output)
}
