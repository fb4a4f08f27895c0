// =============================================================================
// Runtime Configuration — Immutable ranking parameters with atomic save
// =============================================================================
//
// Every weight and threshold the ranking engine uses lives here.  A
// `RankerConfig` is built once and handed (by `Arc`) to each component at
// construction, so two differently-tuned engines can run side by side.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  Every section carries `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Factor;

// =============================================================================
// Normalization
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationParams {
    /// Absolute floor on non-zero readings a cohort needs before a factor is
    /// normalized.
    pub min_valid_count: usize,
    /// Relative floor, as a fraction of cohort size.
    pub min_valid_fraction: f64,
    /// Cohorts smaller than this pass raw values through untouched.
    pub min_cohort_size: usize,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            min_valid_count: 3,
            min_valid_fraction: 0.3,
            min_cohort_size: 2,
        }
    }
}

// =============================================================================
// Coverage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageParams {
    pub technical_weight: f64,
    pub volume_weight: f64,
    pub fundamentals_weight: f64,
    pub options_sentiment_weight: f64,
    pub base_mult: f64,
    pub mult_span: f64,
    /// Coverage ratio at or above which the completeness bonus applies.
    pub full_coverage_ratio: f64,
    pub full_coverage_bonus: f64,
    pub max_mult: f64,
}

impl Default for CoverageParams {
    fn default() -> Self {
        Self {
            technical_weight: 0.40,
            volume_weight: 0.30,
            fundamentals_weight: 0.20,
            options_sentiment_weight: 0.10,
            base_mult: 0.7,
            mult_span: 0.6,
            full_coverage_ratio: 0.9,
            full_coverage_bonus: 0.1,
            max_mult: 1.3,
        }
    }
}

// =============================================================================
// Sector momentum boost
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorBoostParams {
    pub min_batch_size: usize,
    pub min_sector_members: usize,
    /// Percentile (0–100) of per-sector averages a sector must exceed.
    pub hot_percentile: f64,
    pub boost: f64,
}

impl Default for SectorBoostParams {
    fn default() -> Self {
        Self {
            min_batch_size: 10,
            min_sector_members: 3,
            hot_percentile: 75.0,
            boost: 0.05,
        }
    }
}

// =============================================================================
// Composite scoring
// =============================================================================

/// Per-factor weights for the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub momentum: f64,
    pub squeeze: f64,
    pub catalyst: f64,
    pub sentiment: f64,
    pub options: f64,
    pub technical: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            momentum: 0.25,
            squeeze: 0.20,
            catalyst: 0.15,
            sentiment: 0.15,
            options: 0.12,
            technical: 0.13,
        }
    }
}

impl FactorWeights {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Momentum => self.momentum,
            Factor::Squeeze => self.squeeze,
            Factor::Catalyst => self.catalyst,
            Factor::Sentiment => self.sentiment,
            Factor::Options => self.options,
            Factor::Technical => self.technical,
        }
    }

    pub fn total(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    pub weights: FactorWeights,
    /// Gain applied to the weighted z-sum before the sigmoid.
    pub sigmoid_gain: f64,
    /// Penalty kicks in once this many factors are absent.
    pub missing_penalty_min_buckets: usize,
    pub missing_penalty_per_bucket: f64,
    pub max_missing_penalty: f64,
    /// Upper bound of the per-symbol tie-break jitter.
    pub jitter_scale: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            sigmoid_gain: 0.8,
            missing_penalty_min_buckets: 2,
            missing_penalty_per_bucket: 5.0,
            max_missing_penalty: 25.0,
            jitter_scale: 0.001,
        }
    }
}

/// Batch-level differentiation requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParams {
    pub min_variance: f64,
    pub min_range: f64,
    /// Per-rank step of the one-shot fallback boost.
    pub fallback_step: f64,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            min_variance: 5.0,
            min_range: 15.0,
            fallback_step: 0.1,
        }
    }
}

// =============================================================================
// Squeeze detection
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqueezeWeights {
    pub float_tightness: f64,
    pub short_metrics: f64,
    pub options_gamma: f64,
    pub volume_pressure: f64,
}

impl Default for SqueezeWeights {
    fn default() -> Self {
        Self {
            float_tightness: 0.30,
            short_metrics: 0.40,
            options_gamma: 0.20,
            volume_pressure: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqueezeParams {
    pub weights: SqueezeWeights,
    /// Timeout for each external provider call.
    pub provider_timeout_ms: u64,
    /// Maximum in-flight detections per cycle.
    pub max_concurrency: usize,
}

impl Default for SqueezeParams {
    fn default() -> Self {
        Self {
            weights: SqueezeWeights::default(),
            provider_timeout_ms: 2_000,
            max_concurrency: 8,
        }
    }
}

// =============================================================================
// Adaptive cache
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheParams {
    pub squeeze_ttl_secs: u64,
    pub volatile_ttl_secs: u64,
    pub active_ttl_secs: u64,
    pub normal_ttl_secs: u64,
    pub quiet_ttl_secs: u64,

    /// Squeeze tier needs both of these.
    pub squeeze_min_spike: f64,
    pub squeeze_min_volatility: f64,
    /// The remaining tiers need either one.
    pub volatile_min_spike: f64,
    pub volatile_min_volatility: f64,
    pub active_min_spike: f64,
    pub active_min_volatility: f64,
    pub normal_min_spike: f64,
    pub normal_min_volatility: f64,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            squeeze_ttl_secs: 30,
            volatile_ttl_secs: 60,
            active_ttl_secs: 120,
            normal_ttl_secs: 300,
            quiet_ttl_secs: 600,
            squeeze_min_spike: 10.0,
            squeeze_min_volatility: 0.10,
            volatile_min_spike: 5.0,
            volatile_min_volatility: 0.05,
            active_min_spike: 2.0,
            active_min_volatility: 0.03,
            normal_min_spike: 1.0,
            normal_min_volatility: 0.01,
        }
    }
}

// =============================================================================
// RankerConfig
// =============================================================================

/// Top-level configuration for the ranking engine.
///
/// Every section has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankerConfig {
    #[serde(default)]
    pub normalization: NormalizationParams,

    #[serde(default)]
    pub coverage: CoverageParams,

    #[serde(default)]
    pub sector_boost: SectorBoostParams,

    #[serde(default)]
    pub scoring: ScoringParams,

    #[serde(default)]
    pub distribution: DistributionParams,

    #[serde(default)]
    pub squeeze: SqueezeParams,

    #[serde(default)]
    pub cache: CacheParams,
}

impl RankerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ranker config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse ranker config from {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid ranker config in {}", path.display()))?;

        info!(
            path = %path.display(),
            weight_total = config.scoring.weights.total(),
            provider_timeout_ms = config.squeeze.provider_timeout_ms,
            "ranker config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise ranker config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "ranker config saved (atomic)");
        Ok(())
    }

    /// Reject configurations no component can work with.
    pub fn validate(&self) -> Result<()> {
        let w = &self.scoring.weights;
        if Factor::ALL.iter().any(|f| w.get(*f) < 0.0) || w.total() <= 0.0 {
            bail!("factor weights must be non-negative with a positive total");
        }

        let c = &self.coverage;
        let coverage_total =
            c.technical_weight + c.volume_weight + c.fundamentals_weight + c.options_sentiment_weight;
        if coverage_total <= 0.0 {
            bail!("coverage domain weights must sum to a positive value");
        }
        if c.base_mult > c.max_mult {
            bail!("coverage base_mult {} exceeds max_mult {}", c.base_mult, c.max_mult);
        }

        let s = &self.squeeze.weights;
        if s.float_tightness + s.short_metrics + s.options_gamma + s.volume_pressure <= 0.0 {
            bail!("squeeze weights must sum to a positive value");
        }
        if self.squeeze.max_concurrency == 0 {
            bail!("squeeze max_concurrency must be at least 1");
        }

        let t = &self.cache;
        let ttls = [
            t.squeeze_ttl_secs,
            t.volatile_ttl_secs,
            t.active_ttl_secs,
            t.normal_ttl_secs,
            t.quiet_ttl_secs,
        ];
        if ttls.windows(2).any(|pair| pair[0] > pair[1]) {
            bail!("cache TTL tiers must be non-decreasing from squeeze to quiet: {ttls:?}");
        }

        if self.distribution.min_range < 0.0 || self.distribution.min_variance < 0.0 {
            bail!("distribution thresholds must be non-negative");
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RankerConfig::default();
        assert!((cfg.scoring.weights.total() - 1.0).abs() < 1e-9);
        assert!((cfg.scoring.weights.momentum - 0.25).abs() < f64::EPSILON);
        assert_eq!(cfg.normalization.min_valid_count, 3);
        assert_eq!(cfg.sector_boost.min_batch_size, 10);
        assert_eq!(cfg.cache.squeeze_ttl_secs, 30);
        assert_eq!(cfg.cache.quiet_ttl_secs, 600);
        assert!((cfg.distribution.min_range - 15.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RankerConfig = serde_json::from_str("{}").unwrap();
        assert!((cfg.coverage.max_mult - 1.3).abs() < f64::EPSILON);
        assert!((cfg.squeeze.weights.short_metrics - 0.40).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "scoring": { "weights": { "momentum": 0.5 } }, "cache": { "quiet_ttl_secs": 900 } }"#;
        let cfg: RankerConfig = serde_json::from_str(json).unwrap();
        assert!((cfg.scoring.weights.momentum - 0.5).abs() < f64::EPSILON);
        assert!((cfg.scoring.weights.squeeze - 0.20).abs() < f64::EPSILON);
        assert!((cfg.scoring.sigmoid_gain - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.cache.quiet_ttl_secs, 900);
        assert_eq!(cfg.cache.normal_ttl_secs, 300);
    }

    #[test]
    fn validate_rejects_inverted_ttl_tiers() {
        let mut cfg = RankerConfig::default();
        cfg.cache.squeeze_ttl_secs = 900;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_weights() {
        let mut cfg = RankerConfig::default();
        cfg.scoring.weights = FactorWeights {
            momentum: 0.0,
            squeeze: 0.0,
            catalyst: 0.0,
            sentiment: 0.0,
            options: 0.0,
            technical: 0.0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("scout-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ranker_config.json");

        let mut cfg = RankerConfig::default();
        cfg.squeeze.provider_timeout_ms = 750;
        cfg.save(&path).unwrap();

        let loaded = RankerConfig::load(&path).unwrap();
        assert_eq!(loaded.squeeze.provider_timeout_ms, 750);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
