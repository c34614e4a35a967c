#![warn(missing_docs)]
//! bson-bench Report
//!
//! Shapes benchmark statistics into `perf.send` records:
//! - numeric coercion of operation options into report arguments
//! - the five throughput metrics (mean, median, min, max, stddev)
//! - pretty JSON output for single records and whole suites

mod args;
mod json;
mod perf_send;

pub use args::{CoercionRule, KNOWN_OPTIONS, NON_NUMERIC_SENTINEL, coerce_options, rule_for};
pub use json::{ReportError, generate_json_report, write_json_report};
pub use perf_send::{
    MEGABYTES_PER_SECOND, PerfSendInfo, PerfSendMetric, PerfSendMetricType, PerfSendResult,
};
