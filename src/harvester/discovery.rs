//! Metadata discovery: one probe per window to learn its page count

use crate::catalog::probe;
use crate::config::ProbeFailurePolicy;
use crate::harvester::HarvestContext;
use crate::state::WindowPlan;
use crate::window::FetchWindow;
use crate::HarvestError;
use futures::future::join_all;

/// Probes every window concurrently and builds the fetch plans
///
/// A failed probe yields a plan with zero pages under
/// [`ProbeFailurePolicy::Skip`], and fails the stage under
/// [`ProbeFailurePolicy::Abort`]. In both cases every probe is allowed to
/// resolve first.
///
/// # Returns
///
/// One plan per window, in window order
pub async fn discover(
    ctx: &HarvestContext,
    windows: Vec<FetchWindow>,
) -> Result<Vec<WindowPlan>, HarvestError> {
    let probes = windows.iter().map(|window| probe(&ctx.client, &window.query_template));
    let results = join_all(probes).await;

    let plans: Vec<WindowPlan> = windows
        .into_iter()
        .zip(results)
        .map(|(window, result)| match result {
            Ok(metadata) => {
                tracing::info!(
                    "Year {} | total pages: {} | total items: {}",
                    window.year,
                    metadata.total_pages,
                    metadata.total_items
                );
                WindowPlan::probed(window, metadata.total_pages, metadata.total_items)
            }
            Err(e) => {
                tracing::warn!("Year {} | fetching metadata failed: {}", window.year, e);
                WindowPlan::failed(window, e.to_string())
            }
        })
        .collect();

    if ctx.config.harvester.on_probe_failure == ProbeFailurePolicy::Abort {
        if let Some(plan) = plans.iter().find(|plan| plan.is_probe_failed()) {
            return Err(HarvestError::ProbeFailed {
                year: plan.window.year,
                reason: plan.probe_error.clone().unwrap_or_default(),
            });
        }
    }

    Ok(plans)
}
