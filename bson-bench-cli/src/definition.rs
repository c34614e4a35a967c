//! Suite definition files
//!
//! ```toml
//! name = "deserialize large arrays"
//!
//! [[tasks]]
//! documentPath = "fixtures/long_largeArray.json"
//! operation = "deserialize"
//! library = "bson@6.0.0"
//! iterations = 1000
//! warmup = 100
//! tags = ["alerting-benchmark"]
//! options = { promoteLongs = false, validation = { utf8 = false } }
//! ```
//!
//! JSON files with the same shape are accepted as well. Relative document
//! paths are resolved against the directory containing the definition.

use bson_bench_ipc::BenchmarkSpecification;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading a suite definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// File could not be read
    #[error("failed to read suite definition {path}: {source}")]
    Read {
        /// Definition path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TOML definition did not parse
    #[error("invalid TOML suite definition {path}: {source}")]
    Toml {
        /// Definition path
        path: String,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// JSON definition did not parse
    #[error("invalid JSON suite definition {path}: {source}")]
    Json {
        /// Definition path
        path: String,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },
}

/// A named list of benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteDefinition {
    /// Suite name, used in logs
    pub name: String,
    /// Benchmarks in run order
    #[serde(default)]
    pub tasks: Vec<BenchmarkSpecification>,
}

impl SuiteDefinition {
    /// Load a definition, choosing the format by file extension (`.json` or TOML)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: display.clone(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut definition: Self = if is_json {
            serde_json::from_str(&content).map_err(|source| DefinitionError::Json {
                path: display,
                source,
            })?
        } else {
            toml::from_str(&content).map_err(|source| DefinitionError::Toml {
                path: display,
                source,
            })?
        };

        if let Some(base) = path.parent() {
            definition.resolve_documents(base);
        }
        Ok(definition)
    }

    /// Make relative document paths relative to `base`
    pub fn resolve_documents(&mut self, base: &Path) {
        for task in &mut self.tasks {
            let document = Path::new(&task.document_path);
            if document.is_relative() {
                task.document_path = base.join(document).display().to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_bench_ipc::OptionValue;

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(
            &path,
            r#"
name = "arrays"

[[tasks]]
documentPath = "fixtures/long_largeArray.json"
operation = "deserialize"
library = "bson@6.0.0"
iterations = 1000
warmup = 100
tags = ["alerting-benchmark"]
options = { promoteLongs = false, validation = { utf8 = false } }
"#,
        )
        .unwrap();

        let definition = SuiteDefinition::load(&path).unwrap();
        assert_eq!(definition.name, "arrays");
        let task = &definition.tasks[0];
        assert_eq!(
            Path::new(&task.document_path),
            dir.path().join("fixtures/long_largeArray.json")
        );
        assert_eq!(
            task.options.get("promoteLongs"),
            Some(&OptionValue::Bool(false))
        );
        assert_eq!(
            task.options.get("validation"),
            Some(&OptionValue::Utf8Validation(false))
        );
        assert_eq!(task.tags, vec!["alerting-benchmark"]);
        assert!(task.install_location.is_none());
    }

    #[test]
    fn test_load_json_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(
            &path,
            r#"{
                "name": "json",
                "tasks": [{
                    "documentPath": "/data/doc.json",
                    "operation": "serialize",
                    "library": "bson-ext@4.0.0",
                    "iterations": 10,
                    "warmup": 1
                }]
            }"#,
        )
        .unwrap();

        let definition = SuiteDefinition::load(&path).unwrap();
        assert_eq!(definition.tasks[0].document_path, "/data/doc.json");
        assert!(definition.tasks[0].options.is_empty());
    }

    #[test]
    fn test_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(&path, "name = \"x\"\n[[tasks]]\noperation = \"serialize\"\n").unwrap();
        assert!(matches!(
            SuiteDefinition::load(&path),
            Err(DefinitionError::Toml { .. })
        ));
    }
}
