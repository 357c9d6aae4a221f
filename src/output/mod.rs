//! Output module: harvested files and run reports
//!
//! This module handles:
//! - Addressing and writing one file per fetched page or sub-resource list
//! - Collecting per-stage statistics
//! - Printing and exporting the final run summary

mod markdown;
mod sink;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sink::{FileSink, OutputKey, OutputSink};
pub use stats::{
    print_statistics, HarvestReport, RoundStats, SkippedTask, StageStats, WindowSummary,
};
