// =============================================================================
// Coverage Weighter — data completeness multiplier
// =============================================================================
//
// Domains and the fields counted in each:
//
//   technical (40 %)          rsi, vwap, ema9, ema20, atr_pct
//   volume (30 %)             volume_spike, rel_vol_30d, avg_volume
//   fundamentals (20 %)       shares_outstanding, float_shares, short_interest_pct
//   options/sentiment (10 %)  call_put_ratio, iv_percentile, sentiment factor
//
//   coverage_ratio = sum(available / total * domain_weight)
//   multiplier     = base + span * ratio  (+ bonus when ratio >= 0.9), capped

use serde::Serialize;

use crate::runtime_config::{CoverageParams, RankerConfig};
use crate::types::{FeatureSet, NormalizedFeatureSet};

/// Per-domain availability counts behind a multiplier.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageBreakdown {
    pub technical: (usize, usize),
    pub volume: (usize, usize),
    pub fundamentals: (usize, usize),
    pub options_sentiment: (usize, usize),
    pub ratio: f64,
    pub multiplier: f64,
}

pub struct CoverageWeighter {
    params: CoverageParams,
}

impl CoverageWeighter {
    pub fn new(params: CoverageParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &RankerConfig) -> Self {
        Self::new(config.coverage.clone())
    }

    pub fn breakdown(&self, features: &FeatureSet) -> CoverageBreakdown {
        let aux = &features.aux;
        let technical = count(&[aux.rsi, aux.vwap, aux.ema9, aux.ema20, aux.atr_pct]);
        let volume = count(&[aux.volume_spike, aux.rel_vol_30d, aux.avg_volume]);
        let fundamentals = count(&[
            features.shares_outstanding,
            aux.float_shares,
            aux.short_interest_pct,
        ]);
        let options_sentiment = count(&[
            aux.call_put_ratio,
            aux.iv_percentile,
            features.factors.sentiment,
        ]);

        let p = &self.params;
        let weight_total =
            p.technical_weight + p.volume_weight + p.fundamentals_weight + p.options_sentiment_weight;
        let ratio = [
            (technical, p.technical_weight),
            (volume, p.volume_weight),
            (fundamentals, p.fundamentals_weight),
            (options_sentiment, p.options_sentiment_weight),
        ]
        .iter()
        .map(|((available, total), weight)| *available as f64 / *total as f64 * weight)
        .sum::<f64>()
            / weight_total;

        CoverageBreakdown {
            technical,
            volume,
            fundamentals,
            options_sentiment,
            ratio,
            multiplier: self.multiplier_for_ratio(ratio),
        }
    }

    /// Multiplier in [base_mult, max_mult] for one instrument.
    pub fn multiplier(&self, features: &FeatureSet) -> f64 {
        self.breakdown(features).multiplier
    }

    pub fn multiplier_for_ratio(&self, ratio: f64) -> f64 {
        let p = &self.params;
        let ratio = ratio.clamp(0.0, 1.0);
        let mut mult = p.base_mult + p.mult_span * ratio;
        if ratio >= p.full_coverage_ratio {
            mult += p.full_coverage_bonus;
        }
        mult.min(p.max_mult).max(p.base_mult)
    }

    /// Fill `coverage_mult` for every member of a normalized batch.
    pub fn apply(&self, batch: &mut [NormalizedFeatureSet]) {
        for item in batch.iter_mut() {
            item.coverage_mult = self.multiplier(&item.features);
        }
    }
}

impl Default for CoverageWeighter {
    fn default() -> Self {
        Self::new(CoverageParams::default())
    }
}

fn count(fields: &[Option<f64>]) -> (usize, usize) {
    let available = fields
        .iter()
        .filter(|v| v.map_or(false, f64::is_finite))
        .count();
    (available, fields.len())
}
