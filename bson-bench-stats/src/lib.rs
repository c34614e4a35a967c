#![warn(missing_docs)]
//! bson-bench Statistics
//!
//! Turns per-iteration latencies into throughput samples and summarizes them.
//! Every ordering uses a numeric comparator; a lexicographic sort would corrupt
//! medians for multi-digit values.

mod summary;
mod throughput;

pub use summary::{ThroughputSummary, compute_summary, median_of_sorted};
pub use throughput::{throughput_mbps, throughput_samples};

/// Bytes per megabyte as used by the throughput formula (`bytes / ms / 1000`)
pub const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megabyte_matches_formula() {
        // 1 MB in 1000 ms is 1 MB/s
        assert!((throughput_mbps(BYTES_PER_MEGABYTE as u64, 1000.0) - 1.0).abs() < f64::EPSILON);
    }
}
