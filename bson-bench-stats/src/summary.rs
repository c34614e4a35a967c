//! Summary Statistics
//!
//! Mean, median, min, max and population standard deviation over all samples.
//! No outlier rejection: the harness reports what it measured.

/// Summary of a throughput distribution (MB/s)
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Middle sample, or the mean of the middle pair
    pub median: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Population standard deviation about `mean`
    pub std_dev: f64,
    /// Number of samples summarized
    pub sample_count: usize,
}

/// Summarize `samples`; `None` when there is nothing to summarize
pub fn compute_summary(samples: &[f64]) -> Option<ThroughputSummary> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    Some(ThroughputSummary {
        mean,
        median: median_of_sorted(&sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        std_dev: variance.sqrt(),
        sample_count: sorted.len(),
    })
}

/// Median of an ascending slice: the middle element, or the mean of the two
/// middle elements when the length is even. Returns 0.0 for an empty slice.
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_samples() {
        let summary = compute_summary(&vec![0.001; 1000]).unwrap();

        assert!((summary.mean - 0.001).abs() < 1e-15);
        assert!((summary.median - 0.001).abs() < 1e-15);
        assert_eq!(summary.min, 0.001);
        assert_eq!(summary.max, 0.001);
        assert!(summary.std_dev.abs() < 1e-15);
        assert_eq!(summary.sample_count, 1000);
    }

    #[test]
    fn test_nan_samples_sort_last() {
        let summary = compute_summary(&[3.0, f64::NAN, 1.0, 2.0, f64::NAN]).unwrap();

        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.median, 3.0);
        assert!(summary.max.is_nan());
        assert_eq!(summary.sample_count, 5);
    }

    #[test]
    fn test_even_median_averages_middle_pair() {
        let summary = compute_summary(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((summary.median - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_odd_median_takes_middle() {
        let summary = compute_summary(&[9.0, 1.0, 5.0]).unwrap();
        assert!((summary.median - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_numeric_not_lexicographic_order() {
        // Lexicographic order would put 10 before 9
        let summary = compute_summary(&[10.0, 9.0, 100.0]).unwrap();
        assert_eq!(summary.min, 9.0);
        assert_eq!(summary.max, 100.0);
        assert!((summary.median - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_population_std_dev() {
        // Classic example: population stddev of this set is exactly 2
        let summary = compute_summary(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((summary.mean - 5.0).abs() < f64::EPSILON);
        assert!((summary.std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples() {
        assert!(compute_summary(&[]).is_none());
        assert_eq!(median_of_sorted(&[]), 0.0);
    }
}
