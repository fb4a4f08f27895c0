// =============================================================================
// Squeeze Sub-Scores — tiered [0, 1] readings per signal family
// =============================================================================
//
//   float_tightness  <=10M 1.0 | <=25M 0.8 | <=75M 0.6 | >=150M 0.3 | else 0.4
//                    +0.1 when float / outstanding <= 0.5
//   short_metrics    mean of available SI%, SVR, DTCR and borrow-stress tiers
//   options_gamma    provider IV tiers, else call/put tiers, else feature IV
//                    percentile, else 0.3 with no weight
//   volume_pressure  volume-spike tiers + relative volume, capped at 1.0

use serde::{Deserialize, Serialize};

use super::assessment::SignalTag;
use super::providers::AtmOptionsData;

// =============================================================================
// Float
// =============================================================================

pub fn float_tightness(float_shares: Option<f64>, shares_outstanding: Option<f64>) -> Option<f64> {
    let float = float_shares.filter(|f| *f > 0.0)?;

    let mut score = if float <= 10_000_000.0 {
        1.0
    } else if float <= 25_000_000.0 {
        0.8
    } else if float <= 75_000_000.0 {
        0.6
    } else if float >= 150_000_000.0 {
        0.3
    } else {
        0.4
    };

    if let Some(outstanding) = shares_outstanding.filter(|s| *s > 0.0) {
        if float / outstanding <= 0.5 {
            score = (score + 0.1_f64).min(1.0);
        }
    }

    Some(score)
}

// =============================================================================
// Short side
// =============================================================================

pub fn short_interest_tier(si_pct: f64) -> f64 {
    if si_pct >= 30.0 {
        1.0
    } else if si_pct >= 20.0 {
        0.8
    } else if si_pct >= 15.0 {
        0.6
    } else if si_pct >= 10.0 {
        0.4
    } else {
        0.2
    }
}

pub fn short_volume_tier(svr: f64) -> f64 {
    if svr >= 0.6 {
        1.0
    } else if svr >= 0.5 {
        0.7
    } else if svr >= 0.4 {
        0.5
    } else {
        0.2
    }
}

pub fn days_to_cover_tier(dtcr: f64) -> f64 {
    if dtcr >= 10.0 {
        1.0
    } else if dtcr >= 5.0 {
        0.7
    } else if dtcr >= 3.0 {
        0.5
    } else if dtcr >= 1.0 {
        0.3
    } else {
        0.1
    }
}

/// Days to cover from short interest, float and average volume.
pub fn derive_days_to_cover(
    si_pct: Option<f64>,
    float_shares: Option<f64>,
    avg_volume: Option<f64>,
) -> Option<f64> {
    match (si_pct, float_shares, avg_volume) {
        (Some(si), Some(float), Some(vol)) if float > 0.0 && vol > 0.0 => {
            Some(si / 100.0 * float / vol)
        }
        _ => None,
    }
}

/// The short-side inputs after merging provider and feature data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShortInputs {
    pub si_pct: Option<f64>,
    pub svr: Option<f64>,
    pub dtcr: Option<f64>,
    pub borrow_stress: Option<f64>,
}

/// Mean of the tiers that have data.  Absent components are excluded.
pub fn short_metrics(inputs: &ShortInputs) -> Option<f64> {
    let tiers: Vec<f64> = [
        inputs.si_pct.map(short_interest_tier),
        inputs.svr.map(short_volume_tier),
        inputs.dtcr.map(days_to_cover_tier),
        inputs.borrow_stress.map(|s| s.clamp(0.0, 1.0)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if tiers.is_empty() {
        None
    } else {
        Some(tiers.iter().sum::<f64>() / tiers.len() as f64)
    }
}

// =============================================================================
// Options
// =============================================================================

/// Where the options gamma reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GammaSource {
    Provider,
    CallPutRatio,
    IvPercentile,
    Default,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GammaReading {
    pub score: f64,
    pub source: GammaSource,
    /// Confidence in the options reading, 0–1.
    pub confidence: f64,
}

/// Default gamma reading when there is no options signal at all.
pub const DEFAULT_GAMMA: f64 = 0.3;

fn iv_percentile_tier(ivp: f64) -> f64 {
    if ivp <= 20.0 {
        0.8
    } else if ivp <= 40.0 {
        0.5
    } else {
        0.2
    }
}

fn call_put_tier(ratio: f64) -> f64 {
    if ratio >= 3.0 {
        0.9
    } else if ratio >= 2.0 {
        0.7
    } else if ratio >= 1.5 {
        0.5
    } else {
        0.3
    }
}

pub fn options_gamma(
    provider: Option<&AtmOptionsData>,
    call_put_ratio: Option<f64>,
    iv_percentile: Option<f64>,
) -> GammaReading {
    if let Some(data) = provider {
        if data.iv_percentile.is_some() || data.implied_volatility_pct.is_some() {
            let mut score = data.iv_percentile.map_or(0.2, iv_percentile_tier);
            if data.implied_volatility_pct.map_or(false, |iv| iv >= 60.0) {
                score = (score + 0.6_f64).min(1.0);
            }
            return GammaReading {
                score,
                source: GammaSource::Provider,
                confidence: data.confidence.clamp(0.0, 1.0),
            };
        }
    }

    if let Some(ratio) = call_put_ratio {
        return GammaReading {
            score: call_put_tier(ratio),
            source: GammaSource::CallPutRatio,
            confidence: 0.5,
        };
    }

    if let Some(ivp) = iv_percentile {
        return GammaReading {
            score: iv_percentile_tier(ivp),
            source: GammaSource::IvPercentile,
            confidence: 0.4,
        };
    }

    GammaReading {
        score: DEFAULT_GAMMA,
        source: GammaSource::Default,
        confidence: 0.0,
    }
}

// =============================================================================
// Volume
// =============================================================================

pub fn volume_pressure(volume_spike: Option<f64>, rel_vol_30d: Option<f64>) -> Option<f64> {
    if volume_spike.is_none() && rel_vol_30d.is_none() {
        return None;
    }

    let mut score: f64 = match volume_spike {
        Some(s) if s >= 5.0 => 0.6,
        Some(s) if s >= 2.0 => 0.4,
        Some(s) if s >= 1.5 => 0.2,
        _ => 0.0,
    };
    if rel_vol_30d.map_or(false, |rv| rv >= 2.0) {
        score += 0.4;
    }
    Some(score.min(1.0))
}

// =============================================================================
// Signal tags
// =============================================================================

/// Everything tag detection looks at.
#[derive(Debug, Clone, Default)]
pub struct TagInputs {
    pub float_shares: Option<f64>,
    pub short: ShortInputs,
    pub iv_percentile: Option<f64>,
    pub implied_volatility_pct: Option<f64>,
    pub call_put_ratio: Option<f64>,
    pub volume_spike: Option<f64>,
    pub rel_vol_30d: Option<f64>,
}

/// Fired tags; only the strongest rung of each ladder is emitted.
pub fn detect_signals(inputs: &TagInputs) -> Vec<SignalTag> {
    let mut tags = Vec::new();

    match inputs.float_shares.filter(|f| *f > 0.0) {
        Some(f) if f <= 10_000_000.0 => tags.push(SignalTag::MicroFloat),
        Some(f) if f <= 25_000_000.0 => tags.push(SignalTag::LowFloat),
        _ => {}
    }

    match inputs.short.si_pct {
        Some(si) if si >= 30.0 => tags.push(SignalTag::ExtremeShortInterest),
        Some(si) if si >= 20.0 => tags.push(SignalTag::HighShortInterest),
        _ => {}
    }

    if inputs.short.svr.map_or(false, |svr| svr >= 0.5) {
        tags.push(SignalTag::HighShortVolume);
    }

    match inputs.short.dtcr {
        Some(d) if d >= 10.0 => tags.push(SignalTag::ExtremeDaysToCover),
        Some(d) if d >= 5.0 => tags.push(SignalTag::HighDaysToCover),
        _ => {}
    }

    match inputs.short.borrow_stress {
        Some(b) if b >= 0.9 => tags.push(SignalTag::ExtremeBorrowStress),
        Some(b) if b >= 0.7 => tags.push(SignalTag::BorrowStress),
        _ => {}
    }

    if inputs.iv_percentile.map_or(false, |ivp| ivp <= 20.0) {
        tags.push(SignalTag::CompressedIv);
    }

    if inputs.implied_volatility_pct.map_or(false, |iv| iv >= 60.0) {
        tags.push(SignalTag::ElevatedIv);
    }

    match inputs.call_put_ratio {
        Some(r) if r >= 3.0 => tags.push(SignalTag::ExtremeCallFlow),
        Some(r) if r >= 2.0 => tags.push(SignalTag::CallHeavyFlow),
        _ => {}
    }

    match inputs.volume_spike {
        Some(s) if s >= 10.0 => tags.push(SignalTag::VolumeExplosion),
        Some(s) if s >= 5.0 => tags.push(SignalTag::VolumeSpike),
        _ => {}
    }

    if inputs.rel_vol_30d.map_or(false, |rv| rv >= 2.0) {
        tags.push(SignalTag::HighRelativeVolume);
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_tiers_and_ratio_bonus() {
        assert_eq!(float_tightness(None, None), None);
        assert_eq!(float_tightness(Some(0.0), None), None);
        assert_eq!(float_tightness(Some(5e6), None), Some(1.0));
        assert_eq!(float_tightness(Some(20e6), None), Some(0.8));
        assert_eq!(float_tightness(Some(60e6), None), Some(0.6));
        assert_eq!(float_tightness(Some(100e6), None), Some(0.4));
        assert_eq!(float_tightness(Some(200e6), None), Some(0.3));
        // Tight float relative to outstanding shares.
        let s = float_tightness(Some(20e6), Some(50e6)).unwrap();
        assert!((s - 0.9).abs() < 1e-9);
        // Capped at 1.0.
        assert_eq!(float_tightness(Some(5e6), Some(50e6)), Some(1.0));
    }

    #[test]
    fn short_metrics_averages_only_present_components() {
        assert_eq!(short_metrics(&ShortInputs::default()), None);

        let only_si = ShortInputs {
            si_pct: Some(35.0),
            ..ShortInputs::default()
        };
        assert_eq!(short_metrics(&only_si), Some(1.0));

        let mixed = ShortInputs {
            si_pct: Some(35.0),
            svr: Some(0.3),
            ..ShortInputs::default()
        };
        assert!((short_metrics(&mixed).unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn derived_days_to_cover() {
        // 20% of 10M float = 2M short shares over 500k avg volume = 4 days.
        let d = derive_days_to_cover(Some(20.0), Some(10e6), Some(500_000.0)).unwrap();
        assert!((d - 4.0).abs() < 1e-9);
        assert_eq!(derive_days_to_cover(Some(20.0), Some(10e6), Some(0.0)), None);
        assert_eq!(derive_days_to_cover(None, Some(10e6), Some(1.0)), None);
    }

    #[test]
    fn gamma_prefers_provider_then_falls_back() {
        let data = AtmOptionsData {
            iv_percentile: Some(15.0),
            implied_volatility_pct: Some(90.0),
            call_put_ratio: None,
            confidence: 0.8,
        };
        let g = options_gamma(Some(&data), Some(1.0), None);
        assert_eq!(g.source, GammaSource::Provider);
        assert!((g.score - 1.0).abs() < 1e-9);
        assert!((g.confidence - 0.8).abs() < 1e-9);

        let g = options_gamma(None, Some(2.5), Some(10.0));
        assert_eq!(g.source, GammaSource::CallPutRatio);
        assert!((g.score - 0.7).abs() < 1e-9);

        let g = options_gamma(None, None, Some(30.0));
        assert_eq!(g.source, GammaSource::IvPercentile);
        assert!((g.score - 0.5).abs() < 1e-9);

        let g = options_gamma(None, None, None);
        assert_eq!(g.source, GammaSource::Default);
        assert!((g.score - DEFAULT_GAMMA).abs() < 1e-9);
        assert_eq!(g.confidence, 0.0);
    }

    #[test]
    fn empty_provider_snapshot_falls_through() {
        let g = options_gamma(Some(&AtmOptionsData::default()), Some(3.5), None);
        assert_eq!(g.source, GammaSource::CallPutRatio);
    }

    #[test]
    fn volume_pressure_caps_at_one() {
        assert_eq!(volume_pressure(None, None), None);
        assert_eq!(volume_pressure(Some(1.0), None), Some(0.0));
        assert_eq!(volume_pressure(Some(20.0), None), Some(0.6));
        assert_eq!(volume_pressure(Some(20.0), Some(3.0)), Some(1.0));
        assert_eq!(volume_pressure(None, Some(2.0)), Some(0.4));
    }

    #[test]
    fn ladders_emit_strongest_rung_only() {
        let inputs = TagInputs {
            float_shares: Some(5e6),
            short: ShortInputs {
                si_pct: Some(35.0),
                ..ShortInputs::default()
            },
            volume_spike: Some(20.0),
            ..TagInputs::default()
        };
        let tags = detect_signals(&inputs);
        assert_eq!(
            tags,
            vec![
                SignalTag::MicroFloat,
                SignalTag::ExtremeShortInterest,
                SignalTag::VolumeExplosion
            ]
        );
    }
}
