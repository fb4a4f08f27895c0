// =============================================================================
// Squeeze Signal Detector — multi-provider squeeze fusion
// =============================================================================
//
// Fuses four independent sub-scores into one squeeze score:
//
//   score = (0.30 * float + 0.40 * short + 0.20 * gamma + 0.10 * volume)
//           / (sum of weights of the sub-scores that carry a signal)
//
// Provider calls are bounded by a timeout and a panic guard.  A slow,
// failing or panicking provider degrades the pass (its component is dropped
// and confidence falls); it never blocks or fails the batch.  Malformed input
// collapses to the EMPTY sentinel.  `analyze` never returns an error.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::error::DetectionFailure;
use crate::runtime_config::{RankerConfig, SqueezeParams};
use crate::types::FeatureSet;

use super::assessment::{catalyst_strength, classify_squeeze, SqueezeAssessment, SubScores};
use super::providers::{AtmOptionsData, BorrowFlags, ShortInterestData, SqueezeProviders};
use super::subscores::{
    derive_days_to_cover, detect_signals, float_tightness, options_gamma, short_metrics,
    volume_pressure, GammaSource, ShortInputs, TagInputs,
};

/// Confidence credited per provider that answered, and the cap on that credit.
const LIVE_PROVIDER_CREDIT: f64 = 0.03;
const LIVE_PROVIDER_CREDIT_CAP: f64 = 0.10;

/// What the external providers contributed to one pass.
#[derive(Debug, Default)]
struct ProviderInputs {
    short_interest: Option<ShortInterestData>,
    options: Option<AtmOptionsData>,
    live: Vec<String>,
    failures: Vec<DetectionFailure>,
}

pub struct SqueezeSignalDetector {
    params: SqueezeParams,
    providers: SqueezeProviders,
}

impl SqueezeSignalDetector {
    pub fn new(params: SqueezeParams, providers: SqueezeProviders) -> Self {
        Self { params, providers }
    }

    pub fn from_config(config: &RankerConfig, providers: SqueezeProviders) -> Self {
        Self::new(config.squeeze.clone(), providers)
    }

    pub fn providers(&self) -> &SqueezeProviders {
        &self.providers
    }

    /// Assess one instrument.  Always returns an assessment.
    pub async fn analyze(&self, features: &FeatureSet) -> SqueezeAssessment {
        match self.try_analyze(features).await {
            Ok(assessment) => assessment,
            Err(failure) => {
                warn!(symbol = %features.symbol, %failure, "squeeze detection collapsed to empty result");
                SqueezeAssessment::empty(features.symbol.clone())
            }
        }
    }

    async fn try_analyze(&self, features: &FeatureSet) -> Result<SqueezeAssessment, DetectionFailure> {
        if features.is_empty() {
            return Err(DetectionFailure::MalformedInput("no enriched data".to_string()));
        }
        features
            .validate()
            .map_err(|e| DetectionFailure::MalformedInput(e.to_string()))?;

        let inputs = self.gather(features).await;
        for failure in &inputs.failures {
            warn!(symbol = %features.symbol, %failure, "squeeze provider degraded");
        }

        self.compose(features, inputs)
    }

    /// Query the async providers concurrently, each under its own timeout.
    async fn gather(&self, features: &FeatureSet) -> ProviderInputs {
        let symbol = features.symbol.as_str();
        let price = features.aux.price;

        let short_call = async {
            match &self.providers.short_interest {
                Some(p) => Some(self.bounded("short_interest", p.get_short_interest(symbol)).await),
                None => None,
            }
        };
        let options_call = async {
            match &self.providers.options {
                Some(p) => Some(self.bounded("options", p.get_atm_options_data(symbol, price)).await),
                None => None,
            }
        };

        let (short_result, options_result) = tokio::join!(short_call, options_call);

        let mut inputs = ProviderInputs::default();
        match short_result {
            Some(Ok(data)) => {
                inputs.live.push("short_interest".to_string());
                inputs.short_interest = data;
            }
            Some(Err(failure)) => inputs.failures.push(failure),
            None => {}
        }
        match options_result {
            Some(Ok(data)) => {
                inputs.live.push("options".to_string());
                inputs.options = data;
            }
            Some(Err(failure)) => inputs.failures.push(failure),
            None => {}
        }
        inputs
    }

    async fn bounded<T>(
        &self,
        provider: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, DetectionFailure> {
        let timeout_ms = self.params.provider_timeout_ms;
        let guarded = AssertUnwindSafe(call).catch_unwind();
        match tokio::time::timeout(Duration::from_millis(timeout_ms), guarded).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(DetectionFailure::Provider {
                provider,
                message: format!("{e:#}"),
            }),
            Ok(Err(payload)) => Err(DetectionFailure::Provider {
                provider,
                message: panic_message(payload.as_ref()),
            }),
            Err(_) => Err(DetectionFailure::Timeout { provider, timeout_ms }),
        }
    }

    fn compose(
        &self,
        features: &FeatureSet,
        mut inputs: ProviderInputs,
    ) -> Result<SqueezeAssessment, DetectionFailure> {
        let aux = &features.aux;
        let float = aux.float_shares.filter(|f| *f > 0.0);
        let si_data = inputs.short_interest.as_ref();

        // Short side: provider figures win over the enrichment layer's.
        let provider_si = si_data.and_then(|d| d.short_interest_pct);
        let si_pct = provider_si.or(aux.short_interest_pct);
        let si_primary = provider_si.is_some() && si_data.map_or(false, |d| d.primary_source);
        let svr = aux
            .short_volume_ratio
            .or_else(|| si_data.and_then(|d| d.short_volume_ratio));
        let dtcr = derive_days_to_cover(si_pct, float, aux.avg_volume)
            .or_else(|| si_data.and_then(|d| d.days_to_cover))
            .or(aux.days_to_cover);

        let borrow_stress = match &self.providers.borrow_stress {
            Some(calc) if svr.is_some() || dtcr.is_some() || si_pct.is_some() => {
                let flags = si_data.map_or(BorrowFlags::default(), |d| BorrowFlags {
                    hard_to_borrow: d.hard_to_borrow,
                    threshold_list: d.threshold_list,
                });
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    calc.calculate(svr, dtcr, si_pct, flags)
                }));
                match outcome {
                    Ok(Ok(stress)) if stress.score.is_finite() => {
                        inputs.live.push("borrow_stress".to_string());
                        Some(stress.score)
                    }
                    Ok(Ok(_)) => {
                        inputs.failures.push(DetectionFailure::NonFinite("borrow stress"));
                        None
                    }
                    Ok(Err(e)) => {
                        inputs.failures.push(DetectionFailure::Provider {
                            provider: "borrow_stress",
                            message: format!("{e:#}"),
                        });
                        None
                    }
                    Err(payload) => {
                        inputs.failures.push(DetectionFailure::Provider {
                            provider: "borrow_stress",
                            message: panic_message(payload.as_ref()),
                        });
                        None
                    }
                }
            }
            _ => None,
        };

        let short = ShortInputs {
            si_pct,
            svr,
            dtcr,
            borrow_stress,
        };

        // Options side.
        let options_data = inputs.options.as_ref();
        let call_put = options_data
            .and_then(|d| d.call_put_ratio)
            .or(aux.call_put_ratio);
        let iv_percentile = options_data
            .and_then(|d| d.iv_percentile)
            .or(aux.iv_percentile);
        let implied_vol = options_data.and_then(|d| d.implied_volatility_pct);
        let gamma = options_gamma(options_data, call_put, iv_percentile);

        let sub_scores = SubScores {
            float_tightness: float_tightness(float, features.shares_outstanding),
            short_metrics: short_metrics(&short),
            options_gamma: Some(gamma.score),
            gamma_source: Some(gamma.source),
            volume_pressure: volume_pressure(aux.volume_spike, aux.rel_vol_30d),
        };

        // Weighted fusion over the sub-scores that carry a signal.
        let w = &self.params.weights;
        let gamma_weighted = (gamma.source != GammaSource::Default).then_some(gamma.score);
        let weighted = [
            (sub_scores.float_tightness, w.float_tightness),
            (sub_scores.short_metrics, w.short_metrics),
            (gamma_weighted, w.options_gamma),
            (sub_scores.volume_pressure, w.volume_pressure),
        ];
        let (sum, weight_used) = weighted
            .iter()
            .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
            .fold((0.0, 0.0), |(acc, used), (s, wt)| (acc + s, used + wt));
        let score = if weight_used > 0.0 {
            (sum / weight_used).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if !score.is_finite() {
            return Err(DetectionFailure::NonFinite("squeeze score"));
        }

        let signals = detect_signals(&TagInputs {
            float_shares: float,
            short: short.clone(),
            iv_percentile,
            implied_volatility_pct: implied_vol,
            call_put_ratio: call_put,
            volume_spike: aux.volume_spike,
            rel_vol_30d: aux.rel_vol_30d,
        });

        // Confidence: additive evidence, capped at 1.0.
        let mut confidence = 0.0;
        if float.is_some() {
            confidence += 0.25;
        }
        if si_pct.is_some() {
            confidence += if si_primary { 0.30 } else { 0.20 };
        }
        if aux.volume_spike.is_some() || aux.rel_vol_30d.is_some() {
            confidence += 0.20;
        }
        confidence += gamma.confidence * 0.25;
        confidence += (inputs.live.len() as f64 * LIVE_PROVIDER_CREDIT).min(LIVE_PROVIDER_CREDIT_CAP);
        let confidence = confidence.clamp(0.0, 1.0);
        if !confidence.is_finite() {
            return Err(DetectionFailure::NonFinite("confidence"));
        }

        let assessment = SqueezeAssessment {
            symbol: features.symbol.clone(),
            score,
            confidence,
            squeeze_type: classify_squeeze(&signals, float),
            catalyst_strength: catalyst_strength(&signals, score),
            signals,
            sub_scores,
            live_providers: inputs.live,
            degraded: inputs.failures.iter().map(ToString::to_string).collect(),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        };

        debug!(
            symbol = %assessment.symbol,
            score = format!("{:.3}", assessment.score),
            confidence = format!("{:.2}", assessment.confidence),
            squeeze_type = ?assessment.squeeze_type,
            catalyst = ?assessment.catalyst_strength,
            "squeeze assessment complete"
        );

        Ok(assessment)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("panicked: {detail}")
}

impl Default for SqueezeSignalDetector {
    fn default() -> Self {
        Self::new(SqueezeParams::default(), SqueezeProviders::none())
    }
}
