//! Fixture documents
//!
//! Fixtures are stored as extended JSON and always parsed with the reference
//! implementation, so every library version benchmarks the same document.

use bson::Bson;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a fixture
#[derive(Debug, Error)]
pub enum FixtureError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Fixture path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not JSON
    #[error("{path} is not valid JSON: {source}")]
    Json {
        /// Fixture path
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// JSON does not map onto BSON values
    #[error("{path} is not valid extended JSON: {message}")]
    ExtendedJson {
        /// Fixture path
        path: PathBuf,
        /// Conversion error
        message: String,
    },
}

/// Read and parse a fixture file
pub fn load_fixture(path: &Path) -> Result<Bson, FixtureError> {
    let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| FixtureError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Bson::try_from(value).map_err(|e| FixtureError::ExtendedJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
