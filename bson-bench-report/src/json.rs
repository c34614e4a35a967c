//! JSON Output

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors raised while writing reports
#[derive(Debug, Error)]
pub enum ReportError {
    /// Record could not be encoded
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    /// Report file could not be written
    #[error("failed to write report to {path}: {source}")]
    Write {
        /// Destination
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Pretty-print any report value (a single record or a list of records)
pub fn generate_json_report<T: Serialize + ?Sized>(report: &T) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write a report value as pretty JSON to `path`
pub fn write_json_report<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    report: &T,
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let json = generate_json_report(report)?;
    std::fs::write(path, json).map_err(|source| ReportError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerfSendResult;
    use bson_bench_stats::compute_summary;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_list_of_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let summary = compute_summary(&[1.0, 3.0]).unwrap();
        let records = vec![
            PerfSendResult::from_throughput("a", None, BTreeMap::new(), &summary),
            PerfSendResult::from_throughput("b", None, BTreeMap::new(), &summary),
        ];

        write_json_report(&path, &records).unwrap();

        let written: Vec<PerfSendResult> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, records);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing").join("results.json");
        let err = write_json_report(&path, &Vec::<PerfSendResult>::new()).unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
