// =============================================================================
// Shared types used across the Squeeze Scout ranking engine
// =============================================================================
//
// Every numeric field is `Option<f64>`: an absent metric is not the same thing
// as a zero metric, and the normalizer, coverage weighter and squeeze detector
// all depend on telling the two apart.

use serde::{Deserialize, Serialize};

use crate::error::RankingError;

// =============================================================================
// Factors
// =============================================================================

/// The six scored factor domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Momentum,
    Squeeze,
    Catalyst,
    Sentiment,
    Options,
    Technical,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::Momentum,
        Factor::Squeeze,
        Factor::Catalyst,
        Factor::Sentiment,
        Factor::Options,
        Factor::Technical,
    ];
}

impl std::fmt::Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Momentum => write!(f, "momentum"),
            Self::Squeeze => write!(f, "squeeze"),
            Self::Catalyst => write!(f, "catalyst"),
            Self::Sentiment => write!(f, "sentiment"),
            Self::Options => write!(f, "options"),
            Self::Technical => write!(f, "technical"),
        }
    }
}

/// Raw (un-normalized) factor readings for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFactors {
    #[serde(default)]
    pub momentum: Option<f64>,
    #[serde(default)]
    pub squeeze: Option<f64>,
    #[serde(default)]
    pub catalyst: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub options: Option<f64>,
    #[serde(default)]
    pub technical: Option<f64>,
}

impl RawFactors {
    pub fn get(&self, factor: Factor) -> Option<f64> {
        match factor {
            Factor::Momentum => self.momentum,
            Factor::Squeeze => self.squeeze,
            Factor::Catalyst => self.catalyst,
            Factor::Sentiment => self.sentiment,
            Factor::Options => self.options,
            Factor::Technical => self.technical,
        }
    }

    pub fn set(&mut self, factor: Factor, value: Option<f64>) {
        let slot = match factor {
            Factor::Momentum => &mut self.momentum,
            Factor::Squeeze => &mut self.squeeze,
            Factor::Catalyst => &mut self.catalyst,
            Factor::Sentiment => &mut self.sentiment,
            Factor::Options => &mut self.options,
            Factor::Technical => &mut self.technical,
        };
        *slot = value;
    }
}

/// Per-factor z-scores. Same shape as [`RawFactors`], different meaning.
pub type FactorZScores = RawFactors;

// =============================================================================
// Auxiliary metrics
// =============================================================================

/// Market microstructure and positioning metrics collected alongside the
/// factor readings.
///
/// Units: `atr_pct`, `short_interest_pct` and `iv_percentile` are percentages
/// (8.0 means 8 %); `short_volume_ratio` is a fraction in [0, 1];
/// `volume_spike` and `rel_vol_30d` are multiples of normal volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxMetrics {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume_spike: Option<f64>,
    #[serde(default)]
    pub rel_vol_30d: Option<f64>,
    #[serde(default)]
    pub avg_volume: Option<f64>,
    #[serde(default)]
    pub volume_momentum: Option<f64>,
    #[serde(default)]
    pub atr_pct: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub vwap: Option<f64>,
    #[serde(default)]
    pub ema9: Option<f64>,
    #[serde(default)]
    pub ema20: Option<f64>,
    #[serde(default)]
    pub float_shares: Option<f64>,
    #[serde(default)]
    pub short_interest_pct: Option<f64>,
    #[serde(default)]
    pub short_volume_ratio: Option<f64>,
    #[serde(default)]
    pub days_to_cover: Option<f64>,
    #[serde(default)]
    pub call_put_ratio: Option<f64>,
    #[serde(default)]
    pub iv_percentile: Option<f64>,
}

impl AuxMetrics {
    fn fields(&self) -> [(&'static str, Option<f64>); 16] {
        [
            ("price", self.price),
            ("volume_spike", self.volume_spike),
            ("rel_vol_30d", self.rel_vol_30d),
            ("avg_volume", self.avg_volume),
            ("volume_momentum", self.volume_momentum),
            ("atr_pct", self.atr_pct),
            ("rsi", self.rsi),
            ("vwap", self.vwap),
            ("ema9", self.ema9),
            ("ema20", self.ema20),
            ("float_shares", self.float_shares),
            ("short_interest_pct", self.short_interest_pct),
            ("short_volume_ratio", self.short_volume_ratio),
            ("days_to_cover", self.days_to_cover),
            ("call_put_ratio", self.call_put_ratio),
            ("iv_percentile", self.iv_percentile),
        ]
    }

    /// ATR as a fraction of price (0.08 for 8 %), the cache's volatility axis.
    pub fn volatility(&self) -> Option<f64> {
        self.atr_pct.map(|pct| pct / 100.0)
    }
}

// =============================================================================
// FeatureSet
// =============================================================================

/// Everything the enrichment layer knows about one instrument for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub symbol: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    #[serde(default)]
    pub factors: RawFactors,
    #[serde(default)]
    pub aux: AuxMetrics,
}

impl FeatureSet {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Reject feature sets that cannot be scored at all.
    ///
    /// Absent values are fine; present values must be finite, and counts and
    /// prices must not be negative.
    pub fn validate(&self) -> Result<(), RankingError> {
        let invalid = |reason: String| RankingError::InvalidInstrumentData {
            symbol: self.symbol.clone(),
            reason,
        };

        if self.symbol.trim().is_empty() {
            return Err(invalid("empty symbol".to_string()));
        }

        for factor in Factor::ALL {
            if let Some(v) = self.factors.get(factor) {
                if !v.is_finite() {
                    return Err(invalid(format!("non-finite {factor} factor ({v})")));
                }
            }
        }

        for (name, value) in self.aux.fields() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(invalid(format!("non-finite {name} ({v})")));
                }
            }
        }

        if let Some(v) = self.shares_outstanding {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(format!("invalid shares_outstanding ({v})")));
            }
        }

        let non_negative = [
            ("price", self.aux.price),
            ("float_shares", self.aux.float_shares),
            ("avg_volume", self.aux.avg_volume),
            ("volume_spike", self.aux.volume_spike),
        ];
        for (name, value) in non_negative {
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(invalid(format!("negative {name} ({v})")));
                }
            }
        }

        Ok(())
    }

    /// True when the enrichment layer produced nothing usable beyond a symbol.
    pub fn is_empty(&self) -> bool {
        self.shares_outstanding.is_none()
            && Factor::ALL.iter().all(|f| self.factors.get(*f).is_none())
            && self.aux.fields().iter().all(|(_, v)| v.is_none())
    }
}

// =============================================================================
// Peer cohorts
// =============================================================================

/// Float-size bucket used to group peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatBucket {
    Small,
    Medium,
    Large,
    Mega,
}

impl FloatBucket {
    /// Bucket by shares outstanding: small < 50M, medium < 200M,
    /// large < 1B, mega otherwise.
    ///
    /// Unknown (`None`) and zero both land in `Small`.
    pub fn from_shares(shares_outstanding: Option<f64>) -> Self {
        let shares = shares_outstanding.unwrap_or(0.0);
        if shares < 50_000_000.0 {
            Self::Small
        } else if shares < 200_000_000.0 {
            Self::Medium
        } else if shares < 1_000_000_000.0 {
            Self::Large
        } else {
            Self::Mega
        }
    }
}

impl std::fmt::Display for FloatBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
            Self::Mega => write!(f, "mega"),
        }
    }
}

/// Identity of a peer cohort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CohortKey {
    pub sector: String,
    pub float_bucket: FloatBucket,
}

impl std::fmt::Display for CohortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sector, self.float_bucket)
    }
}

// =============================================================================
// NormalizedFeatureSet
// =============================================================================

/// A feature set after peer normalization, coverage weighting and sector
/// boosting.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedFeatureSet {
    pub features: FeatureSet,
    pub cohort: CohortKey,
    pub z_scores: FactorZScores,
    /// In [0.7, 1.3].
    pub coverage_mult: f64,
    /// Either 0.0 or the configured hot-sector boost.
    pub sector_boost: f64,
}

impl NormalizedFeatureSet {
    pub fn symbol(&self) -> &str {
        &self.features.symbol
    }
}
