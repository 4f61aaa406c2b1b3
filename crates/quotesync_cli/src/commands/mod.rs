//! CLI command implementations.

pub mod compare;
pub mod inspect;
pub mod merge;
pub mod resolve;

use quotesync_core::{ClassificationTable, GapPolicy, MergeConfig, Quote};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors from reading and writing command files.
#[derive(Error, Debug)]
pub enum CliError {
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The file.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file did not hold the expected JSON document.
    #[error("{path}: invalid JSON: {source}")]
    Json {
        /// The file.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A merge outcome file holds no pending conflict.
    #[error("{0}: outcome is settled, nothing to resolve")]
    NothingToResolve(String),
}

/// Reads a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Reads a quote from a JSON file.
pub fn read_quote(path: &Path) -> Result<Quote, CliError> {
    read_json(path)
}

/// Loads a classification table, or the standard one if no file is given.
pub fn load_classification(path: Option<&Path>) -> Result<ClassificationTable, CliError> {
    match path {
        Some(path) => {
            let table: ClassificationTable = read_json(path)?;
            tracing::debug!(path = %path.display(), fields = table.scalar_count(), "loaded classification");
            Ok(table)
        }
        None => Ok(ClassificationTable::standard()),
    }
}

/// Builds the merge configuration for `device`.
///
/// `strict` fails on unclassified fields instead of treating them as
/// critical.
pub fn merge_config(
    device: &str,
    classification: Option<&Path>,
    strict: bool,
) -> Result<MergeConfig, CliError> {
    let policy = if strict {
        GapPolicy::FailFast
    } else {
        GapPolicy::TreatAsCritical
    };
    Ok(MergeConfig::new(device)
        .with_classification(load_classification(classification)?)
        .with_gap_policy(policy))
}
