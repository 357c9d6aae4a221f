//! Typed schema for catalog responses
//!
//! Only the fields the harvester acts on are modelled. Bodies are always
//! written out verbatim; parsing here checks the outer shape and pulls out
//! the join keys for sub-resource requests. Records are decoded one by one,
//! so a single bad record never discards the rest of its response.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Name used for the item array of a listing page in error messages
pub const PAGE_CONTAINER: &str = "page";

/// Errors raised when a response does not have the expected shape
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Response could not be decoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Page body is not a JSON array")]
    PageNotArray,

    #[error("Response has no 'result.content' object")]
    MissingContent,

    #[error("'result.content' is not an object")]
    ContentNotObject,

    #[error("Container '{0}' is missing from the response")]
    MissingContainer(String),

    #[error("Container '{0}' is not an array")]
    ContainerNotArray(String),

    #[error("Record {index} in '{container}' is invalid: {source}")]
    InvalidRecord {
        container: String,
        index: usize,
        source: serde_json::Error,
    },
}

/// A challenge as listed on a catalog page
///
/// `id` is required; `legacyId` is optional and `numOfRegistrants` defaults
/// to zero when absent. All other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub id: String,

    #[serde(rename = "legacyId", default)]
    pub legacy_id: Option<i64>,

    #[serde(rename = "numOfRegistrants", default)]
    pub num_of_registrants: i64,
}

impl Item {
    /// Returns true if this item references a non-empty sub-resource list
    pub fn has_sub_resources(&self) -> bool {
        self.num_of_registrants > 0
    }
}

/// A registrant record inside a sub-resource response
#[derive(Debug, Clone, Deserialize)]
pub struct SubResourceRecord {
    pub handle: String,

    #[serde(rename = "registrationDate", default)]
    pub registration_date: Option<String>,
}

/// Items decoded from one listing page
#[derive(Debug, Default)]
pub struct PageItems {
    /// Number of entries in the page array, decodable or not
    pub raw_count: usize,

    pub items: Vec<Item>,

    /// One [`SchemaError::InvalidRecord`] per entry that failed to decode
    pub invalid: Vec<SchemaError>,
}

/// Records extracted from one sub-resource response
#[derive(Debug, Default)]
pub struct SubResourceList {
    /// Every record in the container, written out as-is
    pub records: Vec<Value>,

    /// One [`SchemaError::InvalidRecord`] per record not matching [`SubResourceRecord`]
    pub invalid: Vec<SchemaError>,
}

fn decode_records<'a, T: Deserialize<'a>>(
    records: &'a [Value],
    container: &str,
) -> (Vec<T>, Vec<SchemaError>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match T::deserialize(record) {
            Ok(decoded) => valid.push(decoded),
            Err(source) => invalid.push(SchemaError::InvalidRecord {
                container: container.to_string(),
                index,
                source,
            }),
        }
    }

    (valid, invalid)
}

/// Parses a listing page body into its items
///
/// Only a body that is not a JSON array fails; entries that do not decode
/// as an [`Item`] are returned in [`PageItems::invalid`].
pub fn parse_items(body: &[u8]) -> Result<PageItems, SchemaError> {
    let Value::Array(entries) = serde_json::from_slice::<Value>(body)? else {
        return Err(SchemaError::PageNotArray);
    };

    let (items, invalid) = decode_records(&entries, PAGE_CONTAINER);

    Ok(PageItems {
        raw_count: entries.len(),
        items,
        invalid,
    })
}

/// Extracts the sub-resource list from a `{"result": {"content": {...}}}` envelope
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `container` - Name of the list field inside `result.content`
///
/// # Returns
///
/// * `Ok(SubResourceList)` - Every record, plus the ones not matching [`SubResourceRecord`]
/// * `Err(SchemaError)` - The envelope or the container has the wrong shape
pub fn extract_sub_resources(body: &[u8], container: &str) -> Result<SubResourceList, SchemaError> {
    let mut envelope: Value = serde_json::from_slice(body)?;

    let content = envelope
        .get_mut("result")
        .and_then(|result| result.get_mut("content"))
        .map(Value::take)
        .filter(|content| !content.is_null())
        .ok_or(SchemaError::MissingContent)?;

    let Value::Object(mut content) = content else {
        return Err(SchemaError::ContentNotObject);
    };

    let records = match content.remove(container) {
        Some(Value::Array(records)) => records,
        Some(_) => return Err(SchemaError::ContainerNotArray(container.to_string())),
        None => return Err(SchemaError::MissingContainer(container.to_string())),
    };

    let (_, invalid) = decode_records::<SubResourceRecord>(&records, container);

    Ok(SubResourceList { records, invalid })
}
