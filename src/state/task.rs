//! Task definitions for the harvest stages

use crate::catalog::{page_url, sub_resource_url, Item};
use crate::window::FetchWindow;
use std::fmt;
use url::{ParseError, Url};

/// A window together with its discovered page count
#[derive(Debug, Clone)]
pub struct WindowPlan {
    pub window: FetchWindow,

    /// Number of pages to fetch; zero when the probe failed
    pub total_pages: u32,

    /// Number of matching items reported by the probe
    pub total_items: u64,

    /// Why the probe failed, if it did
    pub probe_error: Option<String>,
}

impl WindowPlan {
    /// Creates a plan from a successful probe
    pub fn probed(window: FetchWindow, total_pages: u32, total_items: u64) -> Self {
        Self {
            window,
            total_pages,
            total_items,
            probe_error: None,
        }
    }

    /// Creates an empty plan for a window whose probe failed
    pub fn failed(window: FetchWindow, reason: impl Into<String>) -> Self {
        Self {
            window,
            total_pages: 0,
            total_items: 0,
            probe_error: Some(reason.into()),
        }
    }

    pub fn is_probe_failed(&self) -> bool {
        self.probe_error.is_some()
    }

    /// Expands the plan into one task per page in `1..=total_pages`
    pub fn page_tasks(&self) -> Vec<PageTask> {
        (1..=self.total_pages)
            .map(|page| PageTask {
                year: self.window.year,
                page,
                url: page_url(&self.window.query_template, page),
            })
            .collect()
    }
}

/// One page of one window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageTask {
    /// Year of the window this page belongs to
    pub year: i32,

    /// 1-based page number
    pub page: u32,

    pub url: Url,
}

impl fmt::Display for PageTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year {} | page {}", self.year, self.page)
    }
}

/// The sub-resource list of one item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubResourceTask {
    /// Year of the page the item was listed on
    pub year: i32,

    /// Page the item was listed on
    pub page: u32,

    /// Item identifier
    pub parent_id: String,

    /// Legacy identifier used as join key, when the item has one
    pub legacy_id: Option<i64>,

    pub url: Url,
}

impl SubResourceTask {
    /// Builds the task for an item found on `(year, page)`
    ///
    /// Returns `Ok(None)` when the item references no sub-resources.
    pub fn from_item(
        item: &Item,
        year: i32,
        page: u32,
        endpoint: &Url,
    ) -> Result<Option<Self>, ParseError> {
        if !item.has_sub_resources() {
            return Ok(None);
        }

        let join_key = match item.legacy_id {
            Some(legacy_id) => legacy_id.to_string(),
            None => item.id.clone(),
        };

        Ok(Some(Self {
            year,
            page,
            parent_id: item.id.clone(),
            legacy_id: item.legacy_id,
            url: sub_resource_url(endpoint, &join_key)?,
        }))
    }
}

impl fmt::Display for SubResourceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.legacy_id {
            Some(legacy_id) => write!(f, "challenge {}/{}", self.parent_id, legacy_id),
            None => write!(f, "challenge {}", self.parent_id),
        }
    }
}
