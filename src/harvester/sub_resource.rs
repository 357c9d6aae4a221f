//! Rate-limited sub-resource fetching
//!
//! The first pass issues the tasks in fixed-size batches with a pause before
//! every batch but the first. Transient failures from the whole pass are
//! collected and, after another pause, retried as a single concurrent wave
//! (or re-batched, when configured). Waves repeat until nothing fails or the
//! round limit is reached. Malformed responses are never retried.

use crate::catalog::{extract_sub_resources, fetch_body, SchemaError};
use crate::harvester::batching::plan_batches;
use crate::harvester::HarvestContext;
use crate::output::{RoundStats, SkippedTask, StageStats};
use crate::state::{SubResourceTask, TaskOutcome};
use crate::HarvestError;
use futures::future::join_all;

/// What a successfully fetched sub-resource list contributed
#[derive(Debug, Default)]
pub struct FetchedList {
    /// Records that were written but do not look like registrants
    pub invalid_records: Vec<SchemaError>,
}

/// Fetches, validates and writes the sub-resource list of one item
///
/// # Returns
///
/// * `Ok(TaskOutcome::Fetched(_))` - The whole list was written
/// * `Ok(TaskOutcome::Transient(_))` - Remote error or timeout
/// * `Ok(TaskOutcome::Malformed(_))` - The response lacks the expected container
/// * `Err(HarvestError)` - The output file could not be written
pub async fn fetch_sub_resource(
    ctx: &HarvestContext,
    task: &SubResourceTask,
) -> Result<TaskOutcome<FetchedList>, HarvestError> {
    let body = match fetch_body(&ctx.client, &task.url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("{} | fetch failed: {}", task, e);
            return Ok(TaskOutcome::Transient(e));
        }
    };

    let list = match extract_sub_resources(&body, &ctx.config.catalog.sub_resource_field) {
        Ok(list) => list,
        Err(e) => {
            tracing::error!("{} | unexpected response: {}", task, e);
            return Ok(TaskOutcome::Malformed(e));
        }
    };

    ctx.sink.write_sub_resource(task, &list.records)?;
    tracing::info!("{} | fetched registrants {}", task, list.records.len());

    for e in &list.invalid {
        tracing::warn!("{} | unexpected record: {}", task, e);
    }

    Ok(TaskOutcome::Fetched(FetchedList {
        invalid_records: list.invalid,
    }))
}

/// Runs one wave of tasks in batches and returns the transient failures
async fn run_wave(
    ctx: &HarvestContext,
    tasks: Vec<SubResourceTask>,
    batch_size: usize,
    stats: &mut StageStats,
) -> Result<Vec<(SubResourceTask, String)>, HarvestError> {
    let batches = plan_batches(tasks.len(), batch_size, ctx.config.harvester.batch_delay());
    let batch_count = batches.len();
    let mut failure_queue = Vec::new();

    for batch in batches {
        if !batch.delay_before.is_zero() {
            tracing::debug!(
                "Batch {}/{}: sleeping {:?} first",
                batch.index + 1,
                batch_count,
                batch.delay_before
            );
            tokio::time::sleep(batch.delay_before).await;
        }

        let slice = &tasks[batch.range.clone()];
        tracing::info!(
            "Sub-resource batch {}/{}: tasks {} - {}",
            batch.index + 1,
            batch_count,
            batch.range.start,
            batch.range.end
        );

        let results = join_all(slice.iter().map(|task| fetch_sub_resource(ctx, task))).await;

        for (task, result) in slice.iter().zip(results) {
            let outcome = result?;
            tracing::trace!("{} | {}", task, outcome.kind());
            match outcome {
                TaskOutcome::Fetched(list) => {
                    stats.fetched += 1;
                    stats
                        .invalid_records
                        .extend(list.invalid_records.into_iter().map(|e| SkippedTask {
                            task: task.to_string(),
                            reason: e.to_string(),
                        }));
                }
                TaskOutcome::Transient(e) => failure_queue.push((task.clone(), e.to_string())),
                TaskOutcome::Malformed(e) => stats.malformed.push(SkippedTask {
                    task: task.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
    }

    Ok(failure_queue)
}

/// Fetches every sub-resource task under the batching discipline
///
/// # Arguments
///
/// * `ctx` - The run context
/// * `tasks` - Every task emitted by the page stage
///
/// # Returns
///
/// * `Ok(StageStats)` - Per-round counts and the tasks that ended without output
/// * `Err(HarvestError)` - An output file could not be written; the stage is aborted
pub async fn fetch_sub_resources(
    ctx: &HarvestContext,
    tasks: Vec<SubResourceTask>,
) -> Result<StageStats, HarvestError> {
    let settings = &ctx.config.harvester;
    let max_rounds = settings.max_rounds.max(1);
    let mut stats = StageStats::new(tasks.len());

    if tasks.is_empty() {
        return Ok(stats);
    }

    let attempted = tasks.len();
    let mut failures = run_wave(ctx, tasks, settings.batch_size, &mut stats).await?;
    stats.rounds.push(RoundStats {
        round: 0,
        attempted,
        failed: failures.len(),
    });

    let mut round = 1;
    while !failures.is_empty() && round < max_rounds {
        tracing::info!(
            "Sub-resource retry round {}: {} tasks, sleeping {:?} first",
            round,
            failures.len(),
            settings.batch_delay()
        );
        tokio::time::sleep(settings.batch_delay()).await;

        let retry: Vec<SubResourceTask> = failures.into_iter().map(|(task, _)| task).collect();
        let attempted = retry.len();
        let batch_size = if settings.rebatch_retries {
            settings.batch_size
        } else {
            attempted
        };

        failures = run_wave(ctx, retry, batch_size, &mut stats).await?;
        stats.rounds.push(RoundStats {
            round,
            attempted,
            failed: failures.len(),
        });
        round += 1;
    }

    if !failures.is_empty() {
        tracing::error!(
            "{} sub-resource tasks still failing after {} rounds",
            failures.len(),
            max_rounds
        );
        stats.permanently_failed = failures
            .into_iter()
            .map(|(task, reason)| SkippedTask {
                task: task.to_string(),
                reason,
            })
            .collect();
    }

    tracing::info!(
        "Fetched {} of {} sub-resource lists",
        stats.fetched,
        stats.planned
    );

    Ok(stats)
}
