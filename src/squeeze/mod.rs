// =============================================================================
// Squeeze Module
// =============================================================================
//
// Per-instrument squeeze assessment:
// - Provider ports (short interest, borrow stress, ATM options), all optional
// - Tiered sub-scores and signal tags
// - Timeout-bounded fusion into a scored, classified assessment

pub mod assessment;
pub mod detector;
pub mod providers;
pub mod subscores;

pub use assessment::{CatalystStrength, SignalFamily, SignalTag, SqueezeAssessment, SqueezeType};
pub use detector::SqueezeSignalDetector;
pub use providers::{
    AtmOptionsData, BorrowStressCalculator, HeuristicBorrowStress, OptionsDataProvider,
    ShortInterestData, ShortInterestProvider, SqueezeProviders,
};
