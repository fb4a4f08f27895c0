// =============================================================================
// Peer Cohorts — sector x float-bucket grouping
// =============================================================================

use std::collections::BTreeMap;

use crate::types::{CohortKey, FeatureSet, FloatBucket};

/// Sector label used when the enrichment layer has none.
pub const UNKNOWN_SECTOR: &str = "UNK";

/// Assign an instrument to its peer cohort.
pub fn classify(features: &FeatureSet) -> CohortKey {
    let sector = features
        .sector
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SECTOR)
        .to_string();

    CohortKey {
        sector,
        float_bucket: FloatBucket::from_shares(features.shares_outstanding),
    }
}

/// Group batch indices by cohort.  Ordered so that iteration (and therefore
/// logging) is deterministic.
pub fn group_by_cohort(batch: &[FeatureSet]) -> BTreeMap<CohortKey, Vec<usize>> {
    let mut cohorts: BTreeMap<CohortKey, Vec<usize>> = BTreeMap::new();
    for (idx, features) in batch.iter().enumerate() {
        cohorts.entry(classify(features)).or_default().push(idx);
    }
    cohorts
}
