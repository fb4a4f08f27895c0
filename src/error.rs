// =============================================================================
// Error taxonomy for the ranking engine
// =============================================================================
//
// Missing data is never an error: it travels as `None` and is down-weighted.
// Provider failures are contained inside the squeeze detector.  Only a failed
// distribution check is allowed to abort a ranking.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RankingError {
    /// The batch failed the differentiation check twice (before and after the
    /// fallback boost).  Signals a mis-configured scorer, not bad input.
    #[error(
        "score distribution too flat after fallback boost: variance {variance:.3} \
         (min {min_variance}), range {range:.3} (min {min_range}) over {count} candidates"
    )]
    Distribution {
        variance: f64,
        range: f64,
        min_variance: f64,
        min_range: f64,
        count: usize,
    },

    /// A malformed feature set.  The engine skips the instrument and keeps
    /// ranking the rest of the batch.
    #[error("invalid instrument data for {symbol}: {reason}")]
    InvalidInstrumentData { symbol: String, reason: String },
}

impl RankingError {
    pub fn is_distribution(&self) -> bool {
        matches!(self, Self::Distribution { .. })
    }
}

/// Why a squeeze detection pass degraded or collapsed.
///
/// Internal to the detector: the public boundary always returns an assessment.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionFailure {
    #[error("{provider} provider timed out after {timeout_ms} ms")]
    Timeout { provider: &'static str, timeout_ms: u64 },

    #[error("{provider} provider failed: {message}")]
    Provider { provider: &'static str, message: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("non-finite {0} while composing squeeze assessment")]
    NonFinite(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_error_message_names_both_checks() {
        let err = RankingError::Distribution {
            variance: 1.25,
            range: 3.0,
            min_variance: 5.0,
            min_range: 15.0,
            count: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("variance 1.250"));
        assert!(msg.contains("range 3.000"));
        assert!(err.is_distribution());
    }

    #[test]
    fn detection_failures_stay_distinguishable() {
        let timeout = DetectionFailure::Timeout { provider: "options", timeout_ms: 500 };
        let malformed = DetectionFailure::MalformedInput("no data".into());
        assert_ne!(timeout, malformed);
        assert!(timeout.to_string().contains("timed out"));
    }
}
