// =============================================================================
// Score distribution check — is the ranking actually differentiated?
// =============================================================================

use serde::Serialize;

use crate::runtime_config::DistributionParams;

/// Population variance and range of a batch of scores.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub range: f64,
}

impl DistributionStats {
    pub fn of(scores: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = scores.into_iter().collect();
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: 0.0,
                variance: 0.0,
                range: 0.0,
            };
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));

        Self {
            count,
            mean,
            variance,
            range: max - min,
        }
    }

    pub fn passes(&self, params: &DistributionParams) -> bool {
        self.variance >= params.min_variance && self.range >= params.min_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_known_series() {
        let s = DistributionStats::of([10.0, 20.0, 30.0]);
        assert_eq!(s.count, 3);
        assert!((s.mean - 20.0).abs() < 1e-9);
        assert!((s.variance - 200.0 / 3.0).abs() < 1e-9);
        assert!((s.range - 20.0).abs() < 1e-9);
        assert!(s.passes(&DistributionParams::default()));
    }

    #[test]
    fn narrow_range_fails_even_with_variance() {
        // variance 25 but range 10
        let s = DistributionStats::of([45.0, 55.0]);
        assert!(s.variance >= 5.0);
        assert!(!s.passes(&DistributionParams::default()));
    }

    #[test]
    fn empty_series_is_flat() {
        let s = DistributionStats::of(Vec::<f64>::new());
        assert_eq!(s.count, 0);
        assert!(!s.passes(&DistributionParams::default()));
    }
}
