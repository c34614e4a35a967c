//! IPC Message Types
//!
//! Mirrors the three message shapes exchanged between a Task and its worker:
//! `runBenchmark` (parent → worker), `returnResult` and `returnError` (worker → parent).

use crate::options::OperationOptions;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// One benchmark as configured by the user.
///
/// Loaded from suite files with serde and shipped to the worker with rkyv.
/// `install_location` is filled in by the Task right before dispatch.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSpecification {
    /// Path to the fixture document (extended JSON)
    pub document_path: String,
    /// `serialize` or `deserialize`; anything else is rejected by the worker
    pub operation: String,
    /// Library reference: `name@version`, `name#ref` or `name:path`
    pub library: String,
    /// Options handed to the operation under test
    #[serde(default)]
    pub options: OperationOptions,
    /// Number of timed iterations
    pub iterations: u64,
    /// Number of untimed warmup iterations
    pub warmup: u64,
    /// Free-form labels copied into the report
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Directory holding installed modules, injected before dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_location: Option<String>,
}

/// Raw timings produced by a worker
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    /// Duration of every measured iteration in milliseconds, in execution order
    pub duration_millis: Vec<f64>,
    /// Size of the serialized document in bytes
    pub document_size_bytes: u64,
}

/// Worker-side failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// Fixture could not be read or parsed
    DocumentRead,
    /// Installed module could not be resolved or loaded
    LibraryLoad,
    /// Reference codec failed to pre-serialize the fixture (deserialize runs)
    FixtureSerialization,
    /// Library under test failed to serialize the fixture once (serialize runs)
    SizeCalculation,
    /// The operation under test failed on the configured input/options
    OperationFailed,
    /// `operation` is neither `serialize` nor `deserialize`
    UnknownOperation,
    /// More measured iterations than one result frame can carry
    TooManyIterations,
    /// Inbound frame was not a `runBenchmark` command this worker understands
    UnknownMessage,
    /// A panic escaped the benchmark code
    Panic,
    /// Anything else
    Unknown,
}

impl FailureKind {
    /// Stable identifier used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::DocumentRead => "DocumentReadError",
            FailureKind::LibraryLoad => "LibraryLoadError",
            FailureKind::FixtureSerialization => "FixtureSerializationError",
            FailureKind::SizeCalculation => "SizeCalculationError",
            FailureKind::OperationFailed => "OperationFailed",
            FailureKind::UnknownOperation => "UnknownOperation",
            FailureKind::TooManyIterations => "TooManyIterationsError",
            FailureKind::UnknownMessage => "UnknownMessage",
            FailureKind::Panic => "WorkerPanic",
            FailureKind::Unknown => "WorkerError",
        }
    }
}

/// Structured error carried by `returnError`
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerFailure {
    /// Category
    pub kind: FailureKind,
    /// Human-readable summary
    pub message: String,
    /// Rendered underlying error, when there is one
    pub cause: Option<String>,
}

impl WorkerFailure {
    /// Failure without an underlying cause
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Failure wrapping an underlying error
    pub fn with_cause(
        kind: FailureKind,
        message: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for WorkerFailure {}

/// Messages sent from the Task to its worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorMessage {
    /// Run one benchmark, report, exit
    RunBenchmark {
        /// Must equal [`crate::PROTOCOL_VERSION`]
        protocol_version: u32,
        /// Complete specification including the install location
        benchmark: BenchmarkSpecification,
    },
}

/// Messages sent from the worker back to its Task
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// All measured iterations completed
    ReturnResult {
        /// Raw timings
        result: BenchmarkResult,
    },
    /// The run failed before or during measurement
    ReturnError {
        /// What went wrong
        error: WorkerFailure,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_includes_cause() {
        let failure = WorkerFailure::with_cause(
            FailureKind::DocumentRead,
            "Failed to read test document",
            "No such file or directory (os error 2)",
        );
        assert_eq!(
            failure.to_string(),
            "Failed to read test document: No such file or directory (os error 2)"
        );

        let bare = WorkerFailure::new(FailureKind::UnknownOperation, "unknown test type");
        assert_eq!(bare.to_string(), "unknown test type");
    }

    #[test]
    fn test_specification_from_json() {
        let spec: BenchmarkSpecification = serde_json::from_str(
            r#"{
                "documentPath": "documents/long_largeArray.json",
                "operation": "deserialize",
                "library": "bson@4.0.0",
                "iterations": 100,
                "warmup": 10,
                "options": { "promoteLongs": true, "index": 0 },
                "tags": ["test"]
            }"#,
        )
        .unwrap();

        assert_eq!(spec.operation, "deserialize");
        assert_eq!(spec.iterations, 100);
        assert_eq!(spec.tags, vec!["test".to_string()]);
        assert!(spec.install_location.is_none());
        assert_eq!(spec.options.len(), 2);
    }

    #[test]
    fn test_specification_rejects_negative_iterations() {
        let parsed: Result<BenchmarkSpecification, _> = serde_json::from_str(
            r#"{
                "documentPath": "a.json",
                "operation": "serialize",
                "library": "bson@6.0.0",
                "iterations": -1,
                "warmup": 0
            }"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_failure_kind_names() {
        assert_eq!(FailureKind::OperationFailed.as_str(), "OperationFailed");
        assert_eq!(FailureKind::UnknownMessage.as_str(), "UnknownMessage");
    }
}
