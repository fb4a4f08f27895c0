// =============================================================================
// Peer-Cohort Z-Score Normalizer
// =============================================================================
//
// For each cohort and each factor:
//
//   1. Collect the present, non-zero readings.
//   2. Cohort of one  =>  the raw reading passes through (no peers to compare).
//   3. valid < max(min_valid_count, min_valid_fraction * |cohort|)
//                      =>  every member's z-score is absent.
//   4. Otherwise       =>  z = round((x - mean) / std, 1), population std,
//                          std of 0 or NaN replaced by 1.0.
//
// Members whose own reading is absent or zero did not contribute to the
// cohort statistics and get an absent z-score.

use tracing::debug;

use crate::normalization::cohort::group_by_cohort;
use crate::runtime_config::{NormalizationParams, RankerConfig};
use crate::types::{FactorZScores, Factor, FeatureSet, NormalizedFeatureSet};

use super::classify;

pub struct Normalizer {
    params: NormalizationParams,
}

impl Normalizer {
    pub fn new(params: NormalizationParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &RankerConfig) -> Self {
        Self::new(config.normalization.clone())
    }

    /// Normalize a complete batch.  The output is index-aligned with `batch`.
    ///
    /// `coverage_mult` starts neutral (1.0) and `sector_boost` at 0.0; the
    /// coverage weighter and sector booster fill them in.
    pub fn normalize(&self, batch: &[FeatureSet]) -> Vec<NormalizedFeatureSet> {
        let mut z_scores = vec![FactorZScores::default(); batch.len()];

        for (cohort, members) in group_by_cohort(batch) {
            for factor in Factor::ALL {
                let raw: Vec<Option<f64>> = members
                    .iter()
                    .map(|&idx| batch[idx].factors.get(factor))
                    .collect();

                let zs = self.cohort_zscores(&raw);
                let present = zs.iter().filter(|z| z.is_some()).count();
                debug!(
                    cohort = %cohort,
                    factor = %factor,
                    members = members.len(),
                    normalized = present,
                    "cohort factor normalized"
                );

                for (&idx, z) in members.iter().zip(zs) {
                    z_scores[idx].set(factor, z);
                }
            }
        }

        batch
            .iter()
            .zip(z_scores)
            .map(|(features, z_scores)| NormalizedFeatureSet {
                cohort: classify(features),
                features: features.clone(),
                z_scores,
                coverage_mult: 1.0,
                sector_boost: 0.0,
            })
            .collect()
    }

    /// Z-scores for one factor across one cohort.
    pub fn cohort_zscores(&self, raw: &[Option<f64>]) -> Vec<Option<f64>> {
        let size = raw.len();

        if size < self.params.min_cohort_size {
            return raw.iter().map(|v| v.map(round1)).collect();
        }

        let valid: Vec<f64> = raw.iter().filter_map(|v| valid_reading(*v)).collect();
        if (valid.len() as f64) < self.min_valid(size) {
            return vec![None; size];
        }

        let n = valid.len() as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let variance = valid.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let mut std = variance.sqrt();
        if std == 0.0 || !std.is_finite() {
            std = 1.0;
        }

        raw.iter()
            .map(|v| valid_reading(*v).map(|x| round1((x - mean) / std)))
            .collect()
    }

    /// Minimum number of valid readings a cohort of `size` needs.
    pub fn min_valid(&self, size: usize) -> f64 {
        (self.params.min_valid_count as f64).max(self.params.min_valid_fraction * size as f64)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizationParams::default())
    }
}

fn valid_reading(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x != 0.0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(symbol: &str, momentum: Option<f64>) -> FeatureSet {
        let mut fs = FeatureSet::new(symbol);
        fs.sector = Some("Tech".into());
        fs.shares_outstanding = Some(20e6);
        fs.factors.momentum = momentum;
        fs
    }

    #[test]
    fn outlier_gets_highest_zscore() {
        let n = Normalizer::default();
        let zs = n.cohort_zscores(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)]);
        let values: Vec<f64> = zs.iter().map(|z| z.unwrap()).collect();
        assert!((values[4] - 2.0).abs() < 1e-9, "got {}", values[4]);
        for v in &values[..4] {
            assert!((v + 0.5).abs() < 1e-9, "got {v}");
        }
    }

    #[test]
    fn insufficient_valid_readings_blank_whole_cohort() {
        let n = Normalizer::default();
        // 2 valid of 5 < max(3, 1.5)
        let zs = n.cohort_zscores(&[Some(1.0), Some(2.0), None, Some(0.0), None]);
        assert!(zs.iter().all(Option::is_none));

        // 3 valid of 12 < max(3, 3.6)
        let mut raw = vec![Some(1.0), Some(2.0), Some(3.0)];
        raw.extend(std::iter::repeat(None).take(9));
        assert!(n.cohort_zscores(&raw).iter().all(Option::is_none));

        // 4 valid of 12 clears the floor
        raw[3] = Some(4.0);
        assert_eq!(n.cohort_zscores(&raw).iter().filter(|z| z.is_some()).count(), 4);
    }

    #[test]
    fn single_member_cohort_passes_raw_through() {
        let n = Normalizer::default();
        assert_eq!(n.cohort_zscores(&[Some(42.04)]), vec![Some(42.0)]);
        assert_eq!(n.cohort_zscores(&[None]), vec![None]);
    }

    #[test]
    fn constant_cohort_uses_unit_std() {
        let n = Normalizer::default();
        let zs = n.cohort_zscores(&[Some(5.0), Some(5.0), Some(5.0)]);
        assert_eq!(zs, vec![Some(0.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn zero_and_absent_members_get_no_zscore() {
        let n = Normalizer::default();
        let zs = n.cohort_zscores(&[Some(1.0), Some(2.0), Some(3.0), Some(0.0), None]);
        assert!(zs[0].is_some() && zs[1].is_some() && zs[2].is_some());
        assert!(zs[3].is_none());
        assert!(zs[4].is_none());
    }

    #[test]
    fn normalize_keeps_batch_order_and_cohorts_separate() {
        let mut batch: Vec<FeatureSet> = (1..=4)
            .map(|i| member(&format!("T{i}"), Some(i as f64)))
            .collect();
        let mut lone = member("BIO", Some(7.3));
        lone.sector = Some("Bio".into());
        batch.push(lone);

        let out = Normalizer::default().normalize(&batch);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].symbol(), "T1");
        assert!(out[0].z_scores.momentum.unwrap() < 0.0);
        assert!(out[3].z_scores.momentum.unwrap() > 0.0);
        // Bio cohort has a single member: raw value passes through.
        assert_eq!(out[4].z_scores.momentum, Some(7.3));
        assert!(out[0].z_scores.squeeze.is_none());
        assert!((out[0].coverage_mult - 1.0).abs() < f64::EPSILON);
    }
}
