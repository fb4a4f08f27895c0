// =============================================================================
// Normalization Module
// =============================================================================
//
// Peer-relative preparation of a discovery batch before scoring:
// - Cohort classification (sector x float bucket)
// - Per-cohort, per-factor z-scoring with validity floors
// - Data coverage multiplier
// - Hot-sector momentum boost
//
// Everything here is a pure function of the whole batch: cohort statistics
// need every member, so partial batches are never normalized.

pub mod cohort;
pub mod coverage;
pub mod sector_momentum;
pub mod zscore;

pub use cohort::classify;
pub use coverage::CoverageWeighter;
pub use sector_momentum::SectorMomentumBooster;
pub use zscore::Normalizer;
