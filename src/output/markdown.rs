//! Markdown summary generation
//!
//! This module writes a human-readable summary of a harvest run next to the
//! harvested files: windows, per-stage counts, retry rounds and every task
//! that ended without output.

use crate::output::stats::{HarvestReport, StageStats};
use crate::HarvestError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a report to `output_path`
pub fn generate_markdown_summary(
    report: &HarvestReport,
    output_path: &Path,
) -> Result<(), HarvestError> {
    let markdown = format_markdown_summary(report);

    let write_err = |source| HarvestError::Write {
        path: output_path.display().to_string(),
        source,
    };
    let mut file = File::create(output_path).map_err(write_err)?;
    file.write_all(markdown.as_bytes()).map_err(write_err)?;

    Ok(())
}

/// Escapes pipes so task labels stay inside their table cell
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn push_stage(md: &mut String, title: &str, stage: &StageStats) {
    md.push_str(&format!("## {}\n\n", title));
    md.push_str(&format!("- **Planned**: {}\n", stage.planned));
    md.push_str(&format!("- **Fetched**: {}\n", stage.fetched));
    md.push_str(&format!("- **Malformed**: {}\n", stage.malformed.len()));
    md.push_str(&format!(
        "- **Permanently Failed**: {}\n",
        stage.permanently_failed.len()
    ));
    md.push_str(&format!(
        "- **Invalid Records**: {}\n",
        stage.invalid_records.len()
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stage.success_rate()
    ));

    if !stage.rounds.is_empty() {
        md.push_str("| Round | Attempted | Requeued |\n");
        md.push_str("|-------|-----------|----------|\n");
        for round in &stage.rounds {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                round.round, round.attempted, round.failed
            ));
        }
        md.push('\n');
    }

    for (heading, skipped) in [
        ("Malformed Responses", &stage.malformed),
        ("Permanently Failed", &stage.permanently_failed),
        ("Invalid Records", &stage.invalid_records),
    ] {
        if skipped.is_empty() {
            continue;
        }
        md.push_str(&format!("### {}\n\n", heading));
        md.push_str("| Task | Reason |\n");
        md.push_str("|------|--------|\n");
        for task in skipped {
            md.push_str(&format!(
                "| {} | {} |\n",
                escape_cell(&task.task),
                escape_cell(&task.reason)
            ));
        }
        md.push('\n');
    }
}

/// Formats a harvest report as markdown
pub fn format_markdown_summary(report: &HarvestReport) -> String {
    let mut md = String::new();

    md.push_str("# Challenge Harvest Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    if let Some(finished) = report.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!("- **Duration**: {} seconds\n", duration));
    }
    md.push_str(&format!(
        "- **Status**: {}\n",
        if report.is_complete() {
            "complete"
        } else {
            "incomplete"
        }
    ));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Windows\n\n");
    md.push_str("| Year | Start | End | Pages | Items | Probe |\n");
    md.push_str("|------|-------|-----|-------|-------|-------|\n");
    for window in &report.windows {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            window.year,
            window.start.to_rfc3339(),
            window.end.to_rfc3339(),
            window.total_pages,
            window.total_items,
            window.probe_error.as_deref().unwrap_or("ok")
        ));
    }
    md.push('\n');

    push_stage(&mut md, "Pages", &report.pages);
    md.push_str(&format!(
        "- **Items Fetched**: {}\n\n",
        report.items_fetched
    ));

    if let Some(sub_resources) = &report.sub_resources {
        push_stage(&mut md, "Sub-resources", sub_resources);
    }

    if !report.missing_legacy_id.is_empty() {
        md.push_str("## Items Without Legacy Id\n\n");
        md.push_str("| Item | Registrants |\n");
        md.push_str("|------|-------------|\n");
        for (id, count) in &report.missing_legacy_id {
            md.push_str(&format!("| {} | {} |\n", id, count));
        }
        md.push('\n');
    }

    md
}
