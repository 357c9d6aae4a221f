//! Output sink: one file per successfully fetched task
//!
//! Every task maps to a unique output key, so concurrent writers within a
//! round never target the same file. Files are written whole: the body goes
//! to a temporary sibling first and is renamed into place.

use crate::config::SubResourceLayout;
use crate::state::{PageTask, SubResourceTask};
use crate::HarvestError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Address of one output unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputKey {
    /// A listing page
    Page { year: i32, page: u32 },

    /// A sub-resource list addressed by the page its parent was listed on
    SubResource {
        year: i32,
        page: u32,
        parent_id: String,
    },

    /// A sub-resource list addressed by its parent only
    Parent { parent_id: String },
}

impl OutputKey {
    pub fn for_page(task: &PageTask) -> Self {
        Self::Page {
            year: task.year,
            page: task.page,
        }
    }

    pub fn for_sub_resource(task: &SubResourceTask, layout: SubResourceLayout) -> Self {
        match layout {
            SubResourceLayout::ByPage => Self::SubResource {
                year: task.year,
                page: task.page,
                parent_id: task.parent_id.clone(),
            },
            SubResourceLayout::ByParent => Self::Parent {
                parent_id: task.parent_id.clone(),
            },
        }
    }

    /// Returns the file name for this key
    pub fn file_name(&self) -> String {
        match self {
            Self::Page { year, page } => format!("{}_{}_challenge_lst.json", year, page),
            Self::SubResource {
                year,
                page,
                parent_id,
            } => format!(
                "{}_{}_{}_registrants.json",
                year,
                page,
                sanitize(parent_id)
            ),
            Self::Parent { parent_id } => format!("{}_registrants.json", sanitize(parent_id)),
        }
    }
}

/// Replaces characters that are unsafe in file names
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Destination for harvested bodies
///
/// A write error is fatal for the stage that issued it.
pub trait OutputSink {
    /// Writes a listing page body verbatim
    fn write_page(&self, task: &PageTask, body: &[u8]) -> Result<PathBuf, HarvestError>;

    /// Writes the extracted sub-resource records as a JSON array
    fn write_sub_resource(
        &self,
        task: &SubResourceTask,
        records: &[Value],
    ) -> Result<PathBuf, HarvestError>;
}

/// Writes output units as files in a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    layout: SubResourceLayout,
}

impl FileSink {
    /// Creates a sink, creating the directory if it does not exist
    pub fn create(directory: &Path, layout: SubResourceLayout) -> Result<Self, HarvestError> {
        fs::create_dir_all(directory).map_err(|source| HarvestError::Write {
            path: directory.display().to_string(),
            source,
        })?;

        Ok(Self {
            directory: directory.to_path_buf(),
            layout,
        })
    }

    /// Returns the path an output key is written to
    pub fn path_for(&self, key: &OutputKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    /// Writes `contents` to `key`, replacing any previous file
    pub fn write(&self, key: &OutputKey, contents: &[u8]) -> Result<PathBuf, HarvestError> {
        let path = self.path_for(key);
        let partial = path.with_extension("json.part");

        fs::write(&partial, contents)
            .and_then(|_| fs::rename(&partial, &path))
            .map_err(|source| HarvestError::Write {
                path: path.display().to_string(),
                source,
            })?;

        Ok(path)
    }
}

impl OutputSink for FileSink {
    fn write_page(&self, task: &PageTask, body: &[u8]) -> Result<PathBuf, HarvestError> {
        self.write(&OutputKey::for_page(task), body)
    }

    fn write_sub_resource(
        &self,
        task: &SubResourceTask,
        records: &[Value],
    ) -> Result<PathBuf, HarvestError> {
        let contents = serde_json::to_vec(records)?;
        self.write(&OutputKey::for_sub_resource(task, self.layout), &contents)
    }
}
