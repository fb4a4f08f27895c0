// =============================================================================
// Composite Scorer — normalized factors to a ranked [0, 100] shortlist
// =============================================================================
//
// Per instrument:
//
//   weighted   = sum(w_i * z_i) / sum(w_i)        over present factors only
//   base       = sigmoid(weighted * gain) * 100
//   base      -= min(5 * missing, 25)             when >= 2 factors missing
//   score      = base * coverage * volatility * momentum * squeeze
//                     * (1 + sector_boost) + jitter
//   score      = clamp(score, 0, 100)
//
// Per batch: the scores must be differentiated (variance and range floors).
// A flat batch gets one deterministic rank-based boost; if it is still flat
// the scorer is mis-configured and ranking fails with a DistributionError.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::RankingError;
use crate::runtime_config::{DistributionParams, RankerConfig, ScoringParams};
use crate::scoring::distribution::DistributionStats;
use crate::scoring::tie_break::symbol_jitter;
use crate::types::{AuxMetrics, CohortKey, Factor, FeatureSet, NormalizedFeatureSet};

// =============================================================================
// Types
// =============================================================================

/// The contribution of a single factor to the weighted z-sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: Factor,
    pub weight: f64,
    pub z_score: f64,
    /// `weight * z_score` rescaled to the present-factor basis.
    pub contribution: f64,
}

/// Final score and audit trail for one ranked instrument.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeScore {
    pub symbol: String,
    /// 1-based position in the ranked batch (0 until ranked).
    pub rank: usize,
    /// In [0, 100].
    pub score: f64,
    pub cohort: CohortKey,
    /// Sigmoid base after the missing-data penalty.
    pub base_score: f64,
    pub missing_buckets: usize,
    pub coverage_mult: f64,
    pub volatility_bonus: f64,
    pub momentum_boost: f64,
    pub squeeze_mult: f64,
    pub sector_boost: f64,
    pub contributions: Vec<FactorContribution>,
    /// True when the batch needed the one-shot differentiation boost.
    pub fallback_applied: bool,
}

// =============================================================================
// CompositeScorer
// =============================================================================

pub struct CompositeScorer {
    scoring: ScoringParams,
    distribution: DistributionParams,
}

impl CompositeScorer {
    pub fn new(scoring: ScoringParams, distribution: DistributionParams) -> Self {
        Self { scoring, distribution }
    }

    pub fn from_config(config: &RankerConfig) -> Self {
        Self::new(config.scoring.clone(), config.distribution.clone())
    }

    /// Score one normalized instrument in isolation.
    pub fn score_one(&self, item: &NormalizedFeatureSet) -> CompositeScore {
        let weights = &self.scoring.weights;

        let mut weighted_sum = 0.0;
        let mut weight_used = 0.0;
        let mut present = Vec::with_capacity(Factor::ALL.len());
        let mut missing_buckets = 0;

        for factor in Factor::ALL {
            match item.z_scores.get(factor).filter(|z| z.is_finite()) {
                Some(z) => {
                    let w = weights.get(factor);
                    weighted_sum += w * z;
                    weight_used += w;
                    present.push((factor, w, z));
                }
                None => missing_buckets += 1,
            }
        }

        let rescale = if weight_used > 0.0 { 1.0 / weight_used } else { 0.0 };
        weighted_sum *= rescale;

        let contributions = present
            .into_iter()
            .map(|(factor, weight, z_score)| FactorContribution {
                factor,
                weight,
                z_score,
                contribution: weight * z_score * rescale,
            })
            .collect();

        let mut base_score = sigmoid(weighted_sum * self.scoring.sigmoid_gain) * 100.0;
        if missing_buckets >= self.scoring.missing_penalty_min_buckets {
            base_score -= (self.scoring.missing_penalty_per_bucket * missing_buckets as f64)
                .min(self.scoring.max_missing_penalty);
        }

        let aux = &item.features.aux;
        let volatility_bonus = volatility_bonus(aux.atr_pct);
        let momentum_boost = momentum_boost(aux);
        let squeeze_mult = squeeze_multiplier(&item.features);

        let raw = base_score
            * item.coverage_mult
            * volatility_bonus
            * momentum_boost
            * squeeze_mult
            * (1.0 + item.sector_boost)
            + symbol_jitter(item.symbol(), self.scoring.jitter_scale);

        let score = clamp_score(raw);

        debug!(
            symbol = %item.symbol(),
            weighted_sum = format!("{:.3}", weighted_sum),
            base = format!("{:.2}", base_score),
            missing_buckets,
            score = format!("{:.3}", score),
            "composite score computed"
        );

        CompositeScore {
            symbol: item.symbol().to_string(),
            rank: 0,
            score,
            cohort: item.cohort.clone(),
            base_score,
            missing_buckets,
            coverage_mult: item.coverage_mult,
            volatility_bonus,
            momentum_boost,
            squeeze_mult,
            sector_boost: item.sector_boost,
            contributions,
            fallback_applied: false,
        }
    }

    /// Score and rank a whole batch, enforcing differentiation.
    pub fn rank(&self, batch: &[NormalizedFeatureSet]) -> Result<Vec<CompositeScore>, RankingError> {
        let mut ranked: Vec<CompositeScore> = batch.iter().map(|item| self.score_one(item)).collect();
        sort_descending(&mut ranked);

        if ranked.len() >= 2 {
            let stats = DistributionStats::of(ranked.iter().map(|s| s.score));
            if !stats.passes(&self.distribution) {
                warn!(
                    variance = format!("{:.3}", stats.variance),
                    range = format!("{:.3}", stats.range),
                    count = stats.count,
                    "score distribution too flat, applying rank fallback boost"
                );
                self.apply_fallback(&mut ranked);

                let retry = DistributionStats::of(ranked.iter().map(|s| s.score));
                if !retry.passes(&self.distribution) {
                    error!(
                        variance = format!("{:.3}", retry.variance),
                        range = format!("{:.3}", retry.range),
                        "score distribution still flat after fallback"
                    );
                    return Err(RankingError::Distribution {
                        variance: retry.variance,
                        range: retry.range,
                        min_variance: self.distribution.min_variance,
                        min_range: self.distribution.min_range,
                        count: retry.count,
                    });
                }
            }
        }

        for (idx, score) in ranked.iter_mut().enumerate() {
            score.rank = idx + 1;
        }
        Ok(ranked)
    }

    /// Add `(N - rank) * step` (0-based rank) to each score, once.
    fn apply_fallback(&self, ranked: &mut [CompositeScore]) {
        let n = ranked.len();
        for (rank, score) in ranked.iter_mut().enumerate() {
            score.score = clamp_score(score.score + (n - rank) as f64 * self.distribution.fallback_step);
            score.fallback_applied = true;
        }
        sort_descending(ranked);
    }
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(ScoringParams::default(), DistributionParams::default())
    }
}

// =============================================================================
// Multipliers
// =============================================================================

/// ATR-tiered bonus; `atr_pct` is a percentage.
pub fn volatility_bonus(atr_pct: Option<f64>) -> f64 {
    match atr_pct.filter(|v| v.is_finite()) {
        Some(atr) if atr >= 8.0 => 1.15,
        Some(atr) if atr >= 4.0 => 1.10,
        Some(atr) if atr >= 2.0 => 1.05,
        _ => 1.0,
    }
}

/// Boost from the count of confirming momentum signals:
/// RSI in [50, 80], price above EMA9, 30-day relative volume >= 2.
pub fn momentum_boost(aux: &AuxMetrics) -> f64 {
    let rsi_ok = aux.rsi.map_or(false, |rsi| (50.0..=80.0).contains(&rsi));
    let above_ema = matches!((aux.price, aux.ema9), (Some(p), Some(e)) if p > e);
    let rel_vol_ok = aux.rel_vol_30d.map_or(false, |rv| rv >= 2.0);

    match [rsi_ok, above_ema, rel_vol_ok].iter().filter(|x| **x).count() {
        3 => 1.12,
        2 => 1.08,
        1 => 1.04,
        _ => 1.0,
    }
}

/// Additive squeeze-setup stack on a base of 1.0.
pub fn squeeze_multiplier(features: &FeatureSet) -> f64 {
    let aux = &features.aux;
    let mut mult = 1.0;

    if aux.float_shares.map_or(false, |f| f > 0.0 && f < 50_000_000.0) {
        mult += 0.10;
    }

    match aux.short_interest_pct {
        Some(si) if si >= 20.0 => mult += 0.15,
        Some(si) if si >= 10.0 => mult += 0.08,
        _ => {}
    }

    match aux.days_to_cover {
        Some(d) if d >= 5.0 => mult += 0.10,
        Some(d) if d >= 3.0 => mult += 0.05,
        _ => {}
    }

    mult
}

/// Overflow-safe logistic function.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn sort_descending(scores: &mut [CompositeScore]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}
