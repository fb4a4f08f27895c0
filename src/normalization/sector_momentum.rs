// =============================================================================
// Sector Momentum Booster — "hot sector" detection from pooled momentum
// =============================================================================
//
// Only meaningful on reasonably large batches (>= 10 instruments).  For each
// sector with at least 3 members the pooled momentum is averaged; a sector
// whose average exceeds the 75th percentile of all sector averages is hot and
// every member receives a flat boost.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::normalization::cohort::classify;
use crate::runtime_config::{RankerConfig, SectorBoostParams};
use crate::types::{FeatureSet, NormalizedFeatureSet};

pub struct SectorMomentumBooster {
    params: SectorBoostParams,
}

impl SectorMomentumBooster {
    pub fn new(params: SectorBoostParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &RankerConfig) -> Self {
        Self::new(config.sector_boost.clone())
    }

    /// Sectors whose pooled momentum beats the configured percentile.
    pub fn hot_sectors(&self, batch: &[FeatureSet]) -> BTreeSet<String> {
        if batch.len() < self.params.min_batch_size {
            return BTreeSet::new();
        }

        let mut members: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for features in batch {
            let sector = sector_of(features);
            *counts.entry(sector.clone()).or_default() += 1;
            if let Some(m) = pooled_momentum(features) {
                members.entry(sector).or_default().push(m);
            }
        }

        let averages: BTreeMap<String, f64> = members
            .into_iter()
            .filter(|(sector, values)| {
                counts.get(sector).copied().unwrap_or(0) >= self.params.min_sector_members
                    && !values.is_empty()
            })
            .map(|(sector, values)| {
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                (sector, avg)
            })
            .collect();

        if averages.is_empty() {
            return BTreeSet::new();
        }

        let mut sorted: Vec<f64> = averages.values().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let cutoff = percentile(&sorted, self.params.hot_percentile);

        let hot: BTreeSet<String> = averages
            .into_iter()
            .filter(|(_, avg)| *avg > cutoff)
            .map(|(sector, _)| sector)
            .collect();

        debug!(cutoff, hot = ?hot, "sector momentum evaluated");
        hot
    }

    /// Set `sector_boost` on every member of a normalized batch.
    pub fn apply(&self, batch: &mut [NormalizedFeatureSet]) {
        let features: Vec<FeatureSet> = batch.iter().map(|n| n.features.clone()).collect();
        let hot = self.hot_sectors(&features);
        for item in batch.iter_mut() {
            item.sector_boost = if hot.contains(&sector_of(&item.features)) {
                self.params.boost
            } else {
                0.0
            };
        }
    }
}

impl Default for SectorMomentumBooster {
    fn default() -> Self {
        Self::new(SectorBoostParams::default())
    }
}

fn sector_of(features: &FeatureSet) -> String {
    classify(features).sector
}

/// Mean of whichever of (momentum, volume_momentum) is present.
fn pooled_momentum(features: &FeatureSet) -> Option<f64> {
    let present: Vec<f64> = [features.factors.momentum, features.aux.volume_momentum]
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// Linear-interpolation percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
