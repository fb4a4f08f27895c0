// =============================================================================
// Squeeze Provider Ports — optional external data capabilities
// =============================================================================
//
// Each capability is its own trait and is independently optional.  A missing
// provider short-circuits the matching sub-score component; it never stands
// in as a zero reading.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Short interest
// =============================================================================

/// Short-side positioning for one symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortInterestData {
    /// Percent of float sold short.
    pub short_interest_pct: Option<f64>,
    pub days_to_cover: Option<f64>,
    /// Fraction of daily volume that was short sales.
    pub short_volume_ratio: Option<f64>,
    /// True when the figure comes from the exchange/regulator filing rather
    /// than an estimate.
    #[serde(default)]
    pub primary_source: bool,
    #[serde(default)]
    pub hard_to_borrow: bool,
    #[serde(default)]
    pub threshold_list: bool,
}

#[async_trait]
pub trait ShortInterestProvider: Send + Sync {
    /// `Ok(None)` means the provider answered but has nothing for `symbol`.
    async fn get_short_interest(&self, symbol: &str) -> Result<Option<ShortInterestData>>;
}

// =============================================================================
// Borrow stress
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowFlags {
    pub hard_to_borrow: bool,
    pub threshold_list: bool,
}

/// Borrow-market stress in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BorrowStress {
    pub score: f64,
}

pub trait BorrowStressCalculator: Send + Sync {
    fn calculate(
        &self,
        svr: Option<f64>,
        dtcr: Option<f64>,
        si_pct: Option<f64>,
        flags: BorrowFlags,
    ) -> Result<BorrowStress>;
}

/// Blend of short-volume ratio, days to cover and short interest, nudged up
/// by hard-to-borrow and threshold-list flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBorrowStress;

impl BorrowStressCalculator for HeuristicBorrowStress {
    fn calculate(
        &self,
        svr: Option<f64>,
        dtcr: Option<f64>,
        si_pct: Option<f64>,
        flags: BorrowFlags,
    ) -> Result<BorrowStress> {
        let components: Vec<f64> = [
            svr.map(|v| (v / 0.7).clamp(0.0, 1.0)),
            dtcr.map(|v| (v / 10.0).clamp(0.0, 1.0)),
            si_pct.map(|v| (v / 40.0).clamp(0.0, 1.0)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if components.is_empty() && !flags.hard_to_borrow && !flags.threshold_list {
            anyhow::bail!("no borrow inputs available");
        }

        let mut score = if components.is_empty() {
            0.0
        } else {
            components.iter().sum::<f64>() / components.len() as f64
        };
        if flags.hard_to_borrow {
            score += 0.2;
        }
        if flags.threshold_list {
            score += 0.1;
        }

        Ok(BorrowStress {
            score: score.clamp(0.0, 1.0),
        })
    }
}

// =============================================================================
// Options
// =============================================================================

/// At-the-money options snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtmOptionsData {
    /// Where current IV sits in its one-year range, 0–100.
    pub iv_percentile: Option<f64>,
    /// ATM implied volatility in percent.
    pub implied_volatility_pct: Option<f64>,
    pub call_put_ratio: Option<f64>,
    /// Provider's own confidence in the snapshot, 0–1.
    #[serde(default)]
    pub confidence: f64,
}

#[async_trait]
pub trait OptionsDataProvider: Send + Sync {
    async fn get_atm_options_data(&self, symbol: &str, price: Option<f64>)
        -> Result<Option<AtmOptionsData>>;
}

// =============================================================================
// Provider bundle
// =============================================================================

#[derive(Clone, Default)]
pub struct SqueezeProviders {
    pub short_interest: Option<Arc<dyn ShortInterestProvider>>,
    pub borrow_stress: Option<Arc<dyn BorrowStressCalculator>>,
    pub options: Option<Arc<dyn OptionsDataProvider>>,
}

impl SqueezeProviders {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_short_interest(mut self, provider: Arc<dyn ShortInterestProvider>) -> Self {
        self.short_interest = Some(provider);
        self
    }

    pub fn with_borrow_stress(mut self, calculator: Arc<dyn BorrowStressCalculator>) -> Self {
        self.borrow_stress = Some(calculator);
        self
    }

    pub fn with_options(mut self, provider: Arc<dyn OptionsDataProvider>) -> Self {
        self.options = Some(provider);
        self
    }

    pub fn configured(&self) -> usize {
        [
            self.short_interest.is_some(),
            self.borrow_stress.is_some(),
            self.options.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count()
    }
}

impl std::fmt::Debug for SqueezeProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqueezeProviders")
            .field("short_interest", &self.short_interest.is_some())
            .field("borrow_stress", &self.borrow_stress.is_some())
            .field("options", &self.options.is_some())
            .finish()
    }
}
