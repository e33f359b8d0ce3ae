//! Exact percentiles over latency samples

/// Latency percentiles reported for every worker
pub const REPORTED_PERCENTILES: [f64; 5] = [0.0, 50.0, 90.0, 99.0, 100.0];

/// Percentile of an ascending slice, interpolating linearly between the two
/// closest ranks (`rank = p / 100 * (n - 1)`).
///
/// Returns `None` for an empty slice. `p` is clamped to `[0, 100]`.
pub fn percentile_sorted(sorted: &[f64], percentile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = percentile.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Percentiles of unsorted samples, one per entry of `percentiles`
pub fn percentiles(values: &[f64], percentiles: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    percentiles
        .iter()
        .map(|p| percentile_sorted(&sorted, *p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_reported_percentiles_in_ms() {
        let latencies_s = [0.050, 0.010, 0.040, 0.020, 0.030];
        let ms: Vec<f64> = latencies_s.iter().map(|s| s * 1000.0).collect();

        let result = percentiles(&ms, &REPORTED_PERCENTILES).unwrap();
        for (actual, expected) in result.iter().zip([10.0, 30.0, 46.0, 49.6, 50.0]) {
            assert_close(*actual, expected);
        }
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(percentile_sorted(&[7.5], 0.0), Some(7.5));
        assert_eq!(percentile_sorted(&[7.5], 99.0), Some(7.5));
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(percentile_sorted(&[], 50.0), None);
        assert_eq!(percentiles(&[], &REPORTED_PERCENTILES), None);
    }

    #[test]
    fn test_interpolates_between_ranks() {
        assert_close(percentile_sorted(&[1.0, 2.0], 50.0).unwrap(), 1.5);
        assert_close(percentile_sorted(&[1.0, 2.0, 4.0], 75.0).unwrap(), 3.0);
        assert_eq!(percentile_sorted(&[1.0, 2.0], 150.0), Some(2.0));
    }
}
