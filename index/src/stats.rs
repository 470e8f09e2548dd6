//! Small numeric helpers for the chunker's breakpoint thresholds.
//!
//! Percentiles use linear interpolation between closest ranks, matching the
//! convention of most scientific computing libraries, so threshold amounts
//! tuned elsewhere carry over unchanged.

/// Linearly interpolated percentile of `values` at `p` in [0, 100].
///
/// Returns 0.0 for an empty slice.
pub(crate) fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Numerical gradient with unit spacing: central differences in the
/// interior, one-sided differences at the ends.
///
/// Returns a copy for slices shorter than two elements.
pub(crate) fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return values.to_vec();
    }

    let mut out = Vec::with_capacity(n);
    out.push(values[1] - values[0]);
    for i in 1..n - 1 {
        out.push((values[i + 1] - values[i - 1]) / 2.0);
    }
    out.push(values[n - 1] - values[n - 2]);
    out
}

#[cfg(test)]
mod tests {
    use super::{gradient, mean, percentile, std_dev};

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-9);
        assert!((percentile(&values, 100.0) - 4.0).abs() < 1e-9);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-9);
        // rank = 0.95 * 3 = 2.85 -> 3.0 * 0.15 + 4.0 * 0.85
        assert!((percentile(&values, 95.0) - 3.85).abs() < 1e-9);
    }

    #[test]
    fn percentile_unsorted_input() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn percentile_empty() {
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn gradient_matches_hand_computation() {
        let values = [1.0, 2.0, 4.0, 7.0];
        let g = gradient(&values);
        assert_eq!(g.len(), 4);
        assert!((g[0] - 1.0).abs() < 1e-9); // 2 - 1
        assert!((g[1] - 1.5).abs() < 1e-9); // (4 - 1) / 2
        assert!((g[2] - 2.5).abs() < 1e-9); // (7 - 2) / 2
        assert!((g[3] - 3.0).abs() < 1e-9); // 7 - 4
    }

    #[test]
    fn gradient_short_inputs() {
        assert_eq!(gradient(&[]), Vec::<f64>::new());
        assert_eq!(gradient(&[1.0]), vec![1.0]);
        assert_eq!(gradient(&[1.0, 3.0]), vec![2.0, 2.0]);
    }
}
