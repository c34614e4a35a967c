//! Throughput Conversion

/// Throughput of one iteration in MB/s.
///
/// `bytes / duration_millis / 1000`: bytes per millisecond is kilobytes per
/// second, divided by 1000 gives megabytes per second.
#[inline]
pub fn throughput_mbps(bytes: u64, duration_millis: f64) -> f64 {
    bytes as f64 / duration_millis / 1000.0
}

/// Convert every duration sample into a throughput sample, preserving order
pub fn throughput_samples(durations_millis: &[f64], bytes: u64) -> Vec<f64> {
    durations_millis
        .iter()
        .map(|&d| throughput_mbps(bytes, d))
        .collect()
}
