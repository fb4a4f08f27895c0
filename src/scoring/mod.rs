// =============================================================================
// Scoring Module
// =============================================================================
//
// Composite scoring of a normalized batch:
// - Weighted, sigmoid-squashed factor z-scores with coverage and setup
//   multipliers
// - Deterministic FNV-1a tie-break jitter
// - Batch-level differentiation check with a one-shot fallback

pub mod composite;
pub mod distribution;
pub mod tie_break;

pub use composite::{CompositeScore, CompositeScorer, FactorContribution};
pub use distribution::DistributionStats;
