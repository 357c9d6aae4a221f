//! Harvest statistics
//!
//! This module collects what each stage did during a run and renders the
//! final fetched-versus-planned report.

use crate::state::WindowPlan;
use chrono::{DateTime, Utc};

/// Attempts made in one round of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStats {
    /// 0-based round number
    pub round: u32,

    /// Number of tasks launched in this round
    pub attempted: usize,

    /// Number of tasks that failed transiently and were queued for the next round
    pub failed: usize,
}

/// A task that ended without output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    /// Human-readable task label
    pub task: String,

    /// Last error observed for the task
    pub reason: String,
}

/// Counters for one stage (pages or sub-resources)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Number of tasks planned for the first round
    pub planned: usize,

    /// Number of tasks whose output was written
    pub fetched: usize,

    /// Tasks dropped because the response had an unexpected shape
    pub malformed: Vec<SkippedTask>,

    /// Tasks still failing after the last allowed round
    pub permanently_failed: Vec<SkippedTask>,

    /// Records inside written responses that did not decode; the response itself was kept
    pub invalid_records: Vec<SkippedTask>,

    /// One entry per round actually run
    pub rounds: Vec<RoundStats>,
}

impl StageStats {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            ..Self::default()
        }
    }

    /// Returns true if every planned task was written
    pub fn is_complete(&self) -> bool {
        self.fetched == self.planned
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.planned == 0 {
            return 100.0;
        }
        (self.fetched as f64 / self.planned as f64) * 100.0
    }
}

/// Probe result for one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub year: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_pages: u32,
    pub total_items: u64,
    pub probe_error: Option<String>,
}

impl From<&WindowPlan> for WindowSummary {
    fn from(plan: &WindowPlan) -> Self {
        Self {
            year: plan.window.year,
            start: plan.window.start,
            end: plan.window.end,
            total_pages: plan.total_pages,
            total_items: plan.total_items,
            probe_error: plan.probe_error.clone(),
        }
    }
}

/// Everything a run did, for display and for the markdown summary
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: Option<String>,

    pub windows: Vec<WindowSummary>,

    /// Listing page stage
    pub pages: StageStats,

    /// Number of items across every written page
    pub items_fetched: usize,

    /// Sub-resource stage, absent when sub-resources were not requested
    pub sub_resources: Option<StageStats>,

    /// Items with sub-resources but no legacy identifier: `(id, count)`
    pub missing_legacy_id: Vec<(String, i64)>,
}

impl HarvestReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            config_hash: None,
            windows: Vec::new(),
            pages: StageStats::default(),
            items_fetched: 0,
            sub_resources: None,
            missing_legacy_id: Vec::new(),
        }
    }

    /// Returns the number of windows whose probe failed
    pub fn failed_probes(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.probe_error.is_some())
            .count()
    }

    /// Returns true if every probe succeeded and every planned task was written
    pub fn is_complete(&self) -> bool {
        self.failed_probes() == 0
            && self.pages.is_complete()
            && self
                .sub_resources
                .as_ref()
                .map_or(true, StageStats::is_complete)
    }

    /// Returns the run duration, once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

fn print_stage(name: &str, stage: &StageStats) {
    println!("{}:", name);
    println!(
        "  Fetched: {} / {} ({:.1}%)",
        stage.fetched,
        stage.planned,
        stage.success_rate()
    );
    println!("  Rounds: {}", stage.rounds.len());
    for round in &stage.rounds {
        println!(
            "    round {}: {} attempted, {} requeued",
            round.round, round.attempted, round.failed
        );
    }
    if !stage.malformed.is_empty() {
        println!("  Malformed ({}):", stage.malformed.len());
        for skipped in &stage.malformed {
            println!("    - {}: {}", skipped.task, skipped.reason);
        }
    }
    if !stage.permanently_failed.is_empty() {
        println!("  Permanently failed ({}):", stage.permanently_failed.len());
        for skipped in &stage.permanently_failed {
            println!("    - {}: {}", skipped.task, skipped.reason);
        }
    }
    if !stage.invalid_records.is_empty() {
        println!("  Invalid records ({}):", stage.invalid_records.len());
        for skipped in &stage.invalid_records {
            println!("    - {}: {}", skipped.task, skipped.reason);
        }
    }
    println!();
}

/// Prints a report to stdout in a formatted manner
pub fn print_statistics(report: &HarvestReport) {
    println!("=== Harvest Statistics ===\n");

    println!("Windows:");
    for window in &report.windows {
        match &window.probe_error {
            None => println!(
                "  {}: {} pages, {} items",
                window.year, window.total_pages, window.total_items
            ),
            Some(reason) => println!("  {}: probe failed ({})", window.year, reason),
        }
    }
    println!();

    print_stage("Pages", &report.pages);
    println!("Items fetched: {}\n", report.items_fetched);

    if let Some(sub_resources) = &report.sub_resources {
        print_stage("Sub-resources", sub_resources);
    }

    if !report.missing_legacy_id.is_empty() {
        println!(
            "Items without legacy id ({}):",
            report.missing_legacy_id.len()
        );
        for (id, count) in &report.missing_legacy_id {
            println!("  - {} ({} registrants)", id, count);
        }
        println!();
    }

    if report.is_complete() {
        println!("Harvest complete");
    } else {
        println!("Harvest incomplete");
    }
}
