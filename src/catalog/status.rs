//! Challenge status filter for listing queries
//!
//! `All` leaves the listing unfiltered; every other variant is sent verbatim
//! as the `status` query parameter.
use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Catalog states a challenge can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum Status {
    /// No status filter
    #[default]
    All,
    New,
    Draft,
    Active,
    Completed,
    Deleted,
    Cancelled,
    CancelledFailedReview,
    CancelledFailedScreening,
    CancelledZeroRegistrations,
    CancelledZeroSubmissions,
    CancelledWinnerUnresponsive,
    CancelledClientRequest,
    CancelledRequirementsInfeasible,
}

impl Status {
    /// Returns the wire representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::New => "New",
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Deleted => "Deleted",
            Self::Cancelled => "Cancelled",
            Self::CancelledFailedReview => "Cancelled - Failed Review",
            Self::CancelledFailedScreening => "Cancelled - Failed Screening",
            Self::CancelledZeroRegistrations => "Cancelled - Zero Registrations",
            Self::CancelledZeroSubmissions => "Cancelled - Zero Submissions",
            Self::CancelledWinnerUnresponsive => "Cancelled - Winner Unresponsive",
            Self::CancelledClientRequest => "Cancelled - Client Request",
            Self::CancelledRequirementsInfeasible => "Cancelled - Requirements Infeasible",
        }
    }

    /// Returns the `status` query parameter value, or `None` when unfiltered
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            other => Some(other.as_str()),
        }
    }

    /// Returns all known statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::All,
            Self::New,
            Self::Draft,
            Self::Active,
            Self::Completed,
            Self::Deleted,
            Self::Cancelled,
            Self::CancelledFailedReview,
            Self::CancelledFailedScreening,
            Self::CancelledZeroRegistrations,
            Self::CancelledZeroSubmissions,
            Self::CancelledWinnerUnresponsive,
            Self::CancelledClientRequest,
            Self::CancelledRequirementsInfeasible,
        ]
    }
}

impl FromStr for Status {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();

        Self::all_statuses()
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ConfigError::UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for Status {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
