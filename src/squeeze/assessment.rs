// =============================================================================
// Squeeze Assessment — classification vocabulary and result type
// =============================================================================

use serde::{Deserialize, Serialize};

use super::subscores::GammaSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqueezeType {
    ShortSqueeze,
    GammaSqueeze,
    HybridSqueeze,
    FloatSqueeze,
    VolumeSqueeze,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalystStrength {
    Error,
    Weak,
    Developing,
    Moderate,
    Strong,
    Explosive,
}

/// Which sub-score a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFamily {
    Float,
    Short,
    Options,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Extreme,
}

/// A fired squeeze signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalTag {
    MicroFloat,
    LowFloat,
    ExtremeShortInterest,
    HighShortInterest,
    HighShortVolume,
    ExtremeDaysToCover,
    HighDaysToCover,
    ExtremeBorrowStress,
    BorrowStress,
    CompressedIv,
    ElevatedIv,
    ExtremeCallFlow,
    CallHeavyFlow,
    VolumeExplosion,
    VolumeSpike,
    HighRelativeVolume,
}

impl SignalTag {
    pub fn family(self) -> SignalFamily {
        match self {
            Self::MicroFloat | Self::LowFloat => SignalFamily::Float,
            Self::ExtremeShortInterest
            | Self::HighShortInterest
            | Self::HighShortVolume
            | Self::ExtremeDaysToCover
            | Self::HighDaysToCover
            | Self::ExtremeBorrowStress
            | Self::BorrowStress => SignalFamily::Short,
            Self::CompressedIv | Self::ElevatedIv | Self::ExtremeCallFlow | Self::CallHeavyFlow => {
                SignalFamily::Options
            }
            Self::VolumeExplosion | Self::VolumeSpike | Self::HighRelativeVolume => {
                SignalFamily::Volume
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::MicroFloat
            | Self::ExtremeShortInterest
            | Self::ExtremeDaysToCover
            | Self::ExtremeBorrowStress
            | Self::ExtremeCallFlow
            | Self::VolumeExplosion => Severity::Extreme,
            _ => Severity::High,
        }
    }
}

/// The four fused sub-scores.
///
/// Float, short and volume readings are absent when they had nothing to work
/// with.  `options_gamma` is always reported once a pass runs; when
/// `gamma_source` is `Default` it is the 0.3 placeholder and carried no weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub float_tightness: Option<f64>,
    pub short_metrics: Option<f64>,
    pub options_gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma_source: Option<GammaSource>,
    pub volume_pressure: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqueezeAssessment {
    pub symbol: String,
    /// In [0, 1].
    pub score: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub signals: Vec<SignalTag>,
    pub squeeze_type: SqueezeType,
    pub catalyst_strength: CatalystStrength,
    pub sub_scores: SubScores,
    /// Providers that answered this pass.
    pub live_providers: Vec<String>,
    /// Provider failures that degraded this pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
    pub analyzed_at: String,
}

impl SqueezeAssessment {
    /// The uniform "nothing usable" sentinel.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            score: 0.0,
            confidence: 0.0,
            signals: Vec::new(),
            squeeze_type: SqueezeType::Unknown,
            catalyst_strength: CatalystStrength::Error,
            sub_scores: SubScores::default(),
            live_providers: Vec::new(),
            degraded: Vec::new(),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.squeeze_type == SqueezeType::Unknown && self.catalyst_strength == CatalystStrength::Error
    }

    pub fn fired(&self, family: SignalFamily) -> bool {
        self.signals.iter().any(|t| t.family() == family)
    }
}

/// Classify the dominant squeeze mechanism from the fired signals.
pub fn classify_squeeze(signals: &[SignalTag], float_shares: Option<f64>) -> SqueezeType {
    let options = signals.iter().any(|t| t.family() == SignalFamily::Options);
    let short = signals.iter().any(|t| t.family() == SignalFamily::Short);

    match (options, short) {
        (true, true) => SqueezeType::HybridSqueeze,
        (true, false) => SqueezeType::GammaSqueeze,
        (false, true) => SqueezeType::ShortSqueeze,
        (false, false) if float_shares.map_or(false, |f| f > 0.0 && f <= 25_000_000.0) => {
            SqueezeType::FloatSqueeze
        }
        (false, false) => SqueezeType::VolumeSqueeze,
    }
}

pub fn catalyst_strength(signals: &[SignalTag], score: f64) -> CatalystStrength {
    let extreme = signals.iter().filter(|t| t.severity() == Severity::Extreme).count();
    let high = signals.iter().filter(|t| t.severity() >= Severity::High).count();

    if extreme >= 2 {
        CatalystStrength::Explosive
    } else if extreme >= 1 || score >= 0.7 {
        CatalystStrength::Strong
    } else if high >= 2 || score >= 0.5 {
        CatalystStrength::Moderate
    } else if score >= 0.3 {
        CatalystStrength::Developing
    } else {
        CatalystStrength::Weak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_needs_both_short_and_options() {
        use SignalTag::*;
        assert_eq!(
            classify_squeeze(&[HighShortInterest, CallHeavyFlow], None),
            SqueezeType::HybridSqueeze
        );
        assert_eq!(classify_squeeze(&[ElevatedIv], None), SqueezeType::GammaSqueeze);
        assert_eq!(classify_squeeze(&[HighDaysToCover], None), SqueezeType::ShortSqueeze);
        assert_eq!(classify_squeeze(&[VolumeSpike], Some(20e6)), SqueezeType::FloatSqueeze);
        assert_eq!(classify_squeeze(&[VolumeSpike], Some(80e6)), SqueezeType::VolumeSqueeze);
        assert_eq!(classify_squeeze(&[], None), SqueezeType::VolumeSqueeze);
    }

    #[test]
    fn catalyst_ladder() {
        use SignalTag::*;
        assert_eq!(catalyst_strength(&[MicroFloat, VolumeExplosion], 0.1), CatalystStrength::Explosive);
        assert_eq!(catalyst_strength(&[MicroFloat], 0.1), CatalystStrength::Strong);
        assert_eq!(catalyst_strength(&[], 0.75), CatalystStrength::Strong);
        assert_eq!(catalyst_strength(&[LowFloat, VolumeSpike], 0.1), CatalystStrength::Moderate);
        assert_eq!(catalyst_strength(&[], 0.55), CatalystStrength::Moderate);
        assert_eq!(catalyst_strength(&[LowFloat], 0.35), CatalystStrength::Developing);
        assert_eq!(catalyst_strength(&[], 0.1), CatalystStrength::Weak);
    }

    #[test]
    fn empty_sentinel_serialises_with_screaming_labels() {
        let a = SqueezeAssessment::empty("ZZZ");
        assert!(a.is_empty());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["squeeze_type"], "UNKNOWN");
        assert_eq!(json["catalyst_strength"], "ERROR");
        assert_eq!(json["confidence"], 0.0);
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn tag_labels() {
        let json = serde_json::to_string(&SignalTag::ExtremeShortInterest).unwrap();
        assert_eq!(json, "\"EXTREME_SHORT_INTEREST\"");
        assert_eq!(SignalTag::CompressedIv.family(), SignalFamily::Options);
    }
}
