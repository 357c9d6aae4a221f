//! Window partitioning for yearly catalog queries
//!
//! The upstream catalog caps the number of results a single query can reach,
//! so a harvest range is split into calendar-year windows. Each window
//! carries the listing URL filtered to its own date range.

use crate::catalog::ListingQuery;
use crate::HarvestError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use url::Url;

/// One bounded query window, identified by its calendar year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    /// Calendar year this window belongs to
    pub year: i32,

    /// First instant covered by the window (inclusive)
    pub start: DateTime<Utc>,

    /// Last instant covered by the window (inclusive)
    pub end: DateTime<Utc>,

    /// Listing URL carrying this window's date-range filter, without a page number
    pub query_template: Url,
}

/// Returns the first instant (00:00:00.000000) of a day in UTC
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_micro_opt(0, 0, 0, 0).unwrap_or_default())
}

/// Returns the last instant (23:59:59.999999) of a day in UTC
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &date
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap_or_default(),
    )
}

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(day_start)
}

fn year_end(year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 12, 31).map(day_end)
}

/// Splits `[since, to]` into contiguous yearly spans
///
/// The first span starts at `since`, the last one ends at `to`, and every
/// interior year covers its full calendar extent. When both ends fall in the
/// same year a single span covering the whole range is returned.
///
/// The caller must ensure `since <= to`; an inverted range yields no spans.
pub fn split_years(
    since: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<(i32, DateTime<Utc>, DateTime<Utc>)> {
    if since > to {
        return Vec::new();
    }

    if since.year() == to.year() {
        return vec![(since.year(), since, to)];
    }

    (since.year()..=to.year())
        .filter_map(|year| {
            let start = if year == since.year() {
                since
            } else {
                year_start(year)?
            };
            let end = if year == to.year() { to } else { year_end(year)? };
            Some((year, start, end))
        })
        .collect()
}

/// Partitions a harvest range into [`FetchWindow`]s
///
/// # Arguments
///
/// * `since` - Start of the range (inclusive)
/// * `to` - End of the range (inclusive)
/// * `query` - Listing query used to build each window's URL template
///
/// # Returns
///
/// * `Ok(Vec<FetchWindow>)` - Windows ordered by year
/// * `Err(HarvestError::InvalidRange)` - `since` is after `to`
pub fn partition(
    since: DateTime<Utc>,
    to: DateTime<Utc>,
    query: &ListingQuery,
) -> Result<Vec<FetchWindow>, HarvestError> {
    if since > to {
        return Err(HarvestError::InvalidRange {
            since: since.to_rfc3339(),
            to: to.to_rfc3339(),
        });
    }

    Ok(split_years(since, to)
        .into_iter()
        .map(|(year, start, end)| FetchWindow {
            year,
            start,
            end,
            query_template: query.window_url(start, end),
        })
        .collect())
}
