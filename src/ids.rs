//! Comma-separated article-id list files.
//!
//! `discover` writes these and `collect` reads them.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors reading or writing an id list.
#[derive(Debug, Error)]
pub enum IdListError {
    /// The list file could not be read.
    #[error("cannot read id list {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The list file could not be written.
    #[error("cannot write id list {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
///
/// ```
/// use harvester_core::ids::parse_id_list;
///
/// assert_eq!(parse_id_list(" 1,2,,3 \n"), vec!["1", "2", "3"]);
/// ```
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Reads an id list file.
///
/// # Errors
///
/// Returns [`IdListError::Read`] if the file cannot be read.
pub fn read_id_list(path: &Path) -> Result<Vec<String>, IdListError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IdListError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let ids = parse_id_list(&raw);
    debug!(path = %path.display(), count = ids.len(), "id list read");
    Ok(ids)
}

/// Writes `ids` comma-joined, without a trailing separator.
///
/// # Errors
///
/// Returns [`IdListError::Write`] if the file cannot be written.
pub fn write_id_list(path: &Path, ids: &[String]) -> Result<(), IdListError> {
    std::fs::write(path, ids.join(",")).map_err(|source| IdListError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns `ids[start..stop]`, clamping both bounds to the list.
///
/// `stop == None` means the end of the list.
#[must_use]
pub fn slice_ids(ids: &[String], start: usize, stop: Option<usize>) -> &[String] {
    let stop = stop.unwrap_or(ids.len()).min(ids.len());
    let start = start.min(stop);
    &ids[start..stop]
}
