//! perf.send Records

use bson_bench_stats::ThroughputSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name used for every throughput statistic
pub const MEGABYTES_PER_SECOND: &str = "megabytes_per_second";

/// Statistic kinds understood by the perf.send schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerfSendMetricType {
    /// Sum of samples
    #[serde(rename = "SUM")]
    Sum,
    /// Number of samples
    #[serde(rename = "COUNT")]
    Count,
    /// Median sample
    #[serde(rename = "MEDIAN")]
    Median,
    /// Arithmetic mean
    #[serde(rename = "MEAN")]
    Mean,
    /// Smallest sample
    #[serde(rename = "MIN")]
    Min,
    /// Largest sample
    #[serde(rename = "MAX")]
    Max,
    /// Population standard deviation
    #[serde(rename = "STANDARD_DEVIATION")]
    StandardDeviation,
    /// Operations per unit time
    #[serde(rename = "THROUGHPUT")]
    Throughput,
    /// Time per operation
    #[serde(rename = "LATENCY")]
    Latency,
    /// 99th percentile
    #[serde(rename = "PERCENTILE_99TH")]
    Percentile99th,
    /// 95th percentile
    #[serde(rename = "PERCENTILE_95TH")]
    Percentile95th,
    /// 90th percentile
    #[serde(rename = "PERCENTILE_90TH")]
    Percentile90th,
    /// 80th percentile
    #[serde(rename = "PERCENTILE_80TH")]
    Percentile80th,
    /// 50th percentile
    #[serde(rename = "PERCENTILE_50TH")]
    Percentile50th,
}

/// Identifies the test a record belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSendInfo {
    /// Version-independent name, shared by runs of different library versions
    pub test_name: String,
    /// Free-form labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Run configuration and coerced operation options
    pub args: BTreeMap<String, f64>,
}

/// One named statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSendMetric {
    /// Metric name, e.g. `megabytes_per_second`
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Statistic kind, serialized as `type`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<PerfSendMetricType>,
    /// Metric schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl PerfSendMetric {
    /// Throughput statistic of the given kind
    pub fn throughput(metric_type: PerfSendMetricType, value: f64) -> Self {
        Self {
            name: MEGABYTES_PER_SECOND.to_string(),
            value,
            metric_type: Some(metric_type),
            version: None,
        }
    }
}

/// A complete perf.send record for one Task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSendResult {
    /// Test identity and arguments
    pub info: PerfSendInfo,
    /// Throughput statistics in emission order
    pub metrics: Vec<PerfSendMetric>,
}

impl PerfSendResult {
    /// Build the record from a throughput summary.
    ///
    /// Metrics are emitted in a fixed order: mean, median, min, max, stddev.
    pub fn from_throughput(
        test_name: impl Into<String>,
        tags: Option<Vec<String>>,
        args: BTreeMap<String, f64>,
        summary: &ThroughputSummary,
    ) -> Self {
        Self {
            info: PerfSendInfo {
                test_name: test_name.into(),
                tags,
                args,
            },
            metrics: vec![
                PerfSendMetric::throughput(PerfSendMetricType::Mean, summary.mean),
                PerfSendMetric::throughput(PerfSendMetricType::Median, summary.median),
                PerfSendMetric::throughput(PerfSendMetricType::Min, summary.min),
                PerfSendMetric::throughput(PerfSendMetricType::Max, summary.max),
                PerfSendMetric::throughput(PerfSendMetricType::StandardDeviation, summary.std_dev),
            ],
        }
    }

    /// Value of the first metric with the given type
    pub fn metric(&self, metric_type: PerfSendMetricType) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.metric_type == Some(metric_type))
            .map(|m| m.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_bench_stats::compute_summary;

    #[test]
    fn test_metric_order_and_types() {
        let summary = compute_summary(&[1.0, 2.0, 3.0]).unwrap();
        let record = PerfSendResult::from_throughput("doc_serialize_bson", None, BTreeMap::new(), &summary);

        let types: Vec<_> = record.metrics.iter().map(|m| m.metric_type.unwrap()).collect();
        assert_eq!(
            types,
            vec![
                PerfSendMetricType::Mean,
                PerfSendMetricType::Median,
                PerfSendMetricType::Min,
                PerfSendMetricType::Max,
                PerfSendMetricType::StandardDeviation,
            ]
        );
        assert!(record.metrics.iter().all(|m| m.name == MEGABYTES_PER_SECOND));
        assert_eq!(record.metric(PerfSendMetricType::Max), Some(3.0));
    }

    #[test]
    fn test_json_shape() {
        let summary = compute_summary(&[2.0]).unwrap();
        let mut args = BTreeMap::new();
        args.insert("warmup".to_string(), 10.0);
        let record = PerfSendResult::from_throughput(
            "doc_deserialize_bson",
            Some(vec!["test".to_string()]),
            args,
            &summary,
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["info"]["test_name"], "doc_deserialize_bson");
        assert_eq!(value["info"]["tags"][0], "test");
        assert_eq!(value["info"]["args"]["warmup"], 10.0);
        assert_eq!(value["metrics"][4]["type"], "STANDARD_DEVIATION");
        assert!(value["metrics"][0].get("version").is_none());
    }

    #[test]
    fn test_untagged_record_omits_tags() {
        let summary = compute_summary(&[2.0]).unwrap();
        let record = PerfSendResult::from_throughput("t", None, BTreeMap::new(), &summary);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["info"].get("tags").is_none());
    }
}
