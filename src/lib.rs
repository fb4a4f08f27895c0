// =============================================================================
// Squeeze Scout — candidate ranking engine
// =============================================================================
//
// Turns raw per-instrument market metrics into a ranked shortlist:
// peer-cohort normalization, composite scoring, squeeze-signal fusion and an
// adaptive TTL cache, driven one discovery cycle at a time by `RankingEngine`.

pub mod cache;
pub mod engine;
pub mod error;
pub mod normalization;
pub mod runtime_config;
pub mod scoring;
pub mod squeeze;
pub mod types;

pub use cache::{AdaptiveCache, CacheLookup, CacheMetrics, CacheStats};
pub use engine::{CycleOutcome, CycleReport, RankedBatch, RankingEngine, SkippedInstrument};
pub use error::{DetectionFailure, RankingError};
pub use runtime_config::RankerConfig;
pub use scoring::CompositeScore;
pub use squeeze::{SqueezeAssessment, SqueezeProviders, SqueezeSignalDetector};
pub use types::{AuxMetrics, Factor, FeatureSet, NormalizedFeatureSet, RawFactors};
