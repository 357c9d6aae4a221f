//! Outcome classification for a single task attempt
//!
//! Every attempt ends in exactly one of three ways. Fatal conditions (an
//! output file that cannot be written) are not outcomes: they abort the stage.
use crate::catalog::{FetchError, SchemaError};
use std::fmt;

/// Result of one attempt at a page or sub-resource task
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The body was fetched, validated and written
    Fetched(T),

    /// Remote error or timeout; the task goes back into the next round
    Transient(FetchError),

    /// The response had an unexpected shape; the task is dropped
    Malformed(SchemaError),
}

impl<T> TaskOutcome<T> {
    /// Returns the kind of this outcome without its payload
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Fetched(_) => OutcomeKind::Fetched,
            Self::Transient(_) => OutcomeKind::Transient,
            Self::Malformed(_) => OutcomeKind::Malformed,
        }
    }
}

/// Payload-free view of a [`TaskOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Fetched,
    Transient,
    Malformed,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Transient => "transient",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
