//! Catalog module: everything that knows the upstream API's shape
//!
//! This module contains:
//! - The challenge status filter
//! - URL construction for probes, pages and sub-resources
//! - The typed schema for listing items and registrant lists
//! - HTTP client construction and request helpers

mod client;
mod query;
mod schema;
mod status;

pub use client::{
    build_http_client, fetch_body, probe, FetchError, PageMetadata, TOTAL_HEADER,
    TOTAL_PAGES_HEADER,
};
pub use query::{format_timestamp, page_url, sub_resource_url, ListingQuery};
pub use schema::{
    extract_sub_resources, parse_items, Item, PageItems, SchemaError, SubResourceList,
    SubResourceRecord, PAGE_CONTAINER,
};
pub use status::Status;
