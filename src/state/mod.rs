//! Work units and outcome classification for the harvest engine
//!
//! Tasks are immutable: a failed task is re-queued as-is for the next round,
//! never mutated.

mod outcome;
mod task;

pub use outcome::{OutcomeKind, TaskOutcome};
pub use task::{PageTask, SubResourceTask, WindowPlan};
