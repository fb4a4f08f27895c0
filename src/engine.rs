// =============================================================================
// Ranking Engine — one discovery cycle end to end
// =============================================================================
//
//   validate -> normalize -> coverage -> sector boost -> score/rank
//            -> squeeze detection (bounded concurrency) -> cache write-through
//
// Invalid instruments are skipped and reported; they never abort the batch.
// Each cycle takes a generation number.  A cycle that finds a newer one has
// started while it was waiting on providers reports `Superseded` and leaves
// the cache untouched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{AdaptiveCache, CacheLookup, CacheMetrics, CacheStats};
use crate::error::RankingError;
use crate::normalization::{CoverageWeighter, Normalizer, SectorMomentumBooster};
use crate::runtime_config::RankerConfig;
use crate::scoring::{CompositeScore, CompositeScorer};
use crate::squeeze::{SqueezeAssessment, SqueezeProviders, SqueezeSignalDetector};
use crate::types::FeatureSet;

// =============================================================================
// Reports
// =============================================================================

/// An instrument left out of the cycle and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedInstrument {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedBatch {
    pub ranked: Vec<CompositeScore>,
    pub skipped: Vec<SkippedInstrument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub cycle_id: u64,
    pub ranked: Vec<CompositeScore>,
    /// Sorted by symbol.
    pub assessments: Vec<SqueezeAssessment>,
    pub skipped: Vec<SkippedInstrument>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    Superseded { cycle_id: u64 },
}

// =============================================================================
// RankingEngine
// =============================================================================

pub struct RankingEngine {
    config: Arc<RankerConfig>,
    normalizer: Normalizer,
    coverage: CoverageWeighter,
    booster: SectorMomentumBooster,
    scorer: CompositeScorer,
    detector: SqueezeSignalDetector,
    cache: Arc<AdaptiveCache<serde_json::Value>>,
    generation: AtomicU64,
}

impl RankingEngine {
    pub fn new(config: RankerConfig, providers: SqueezeProviders) -> Self {
        let config = Arc::new(config);
        info!(
            providers = providers.configured(),
            max_concurrency = config.squeeze.max_concurrency,
            provider_timeout_ms = config.squeeze.provider_timeout_ms,
            "ranking engine initialised"
        );
        Self {
            normalizer: Normalizer::from_config(&config),
            coverage: CoverageWeighter::from_config(&config),
            booster: SectorMomentumBooster::from_config(&config),
            scorer: CompositeScorer::from_config(&config),
            detector: SqueezeSignalDetector::from_config(&config, providers),
            cache: Arc::new(AdaptiveCache::new(config.cache.clone())),
            generation: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AdaptiveCache<serde_json::Value>> {
        &self.cache
    }

    pub fn cached(&self, symbol: &str) -> CacheLookup<serde_json::Value> {
        self.cache.get_with_metrics(symbol)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Split a batch into valid feature sets and skipped instruments.
    fn prepare(&self, batch: &BTreeMap<String, FeatureSet>) -> (Vec<FeatureSet>, Vec<SkippedInstrument>) {
        let mut valid = Vec::with_capacity(batch.len());
        let mut skipped = Vec::new();

        for (key, features) in batch {
            let check = if key != &features.symbol {
                Err(format!("keyed as {key} but carries symbol {:?}", features.symbol))
            } else {
                features.validate().map_err(|e| e.to_string())
            };

            match check {
                Ok(()) => valid.push(features.clone()),
                Err(reason) => {
                    warn!(symbol = %key, %reason, "skipping invalid instrument");
                    skipped.push(SkippedInstrument {
                        symbol: key.clone(),
                        reason,
                    });
                }
            }
        }
        (valid, skipped)
    }

    fn rank_valid(&self, valid: &[FeatureSet]) -> Result<Vec<CompositeScore>, RankingError> {
        let mut normalized = self.normalizer.normalize(valid);
        self.coverage.apply(&mut normalized);
        self.booster.apply(&mut normalized);
        self.scorer.rank(&normalized)
    }

    /// Normalize and score a batch.  Only a failed distribution check is an
    /// error.
    pub fn rank(&self, batch: &BTreeMap<String, FeatureSet>) -> Result<RankedBatch, RankingError> {
        let (valid, skipped) = self.prepare(batch);
        let ranked = self.rank_valid(&valid)?;
        Ok(RankedBatch { ranked, skipped })
    }

    fn is_current(&self, cycle_id: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == cycle_id
    }

    /// Run one full discovery cycle.
    pub async fn run_cycle(&self, batch: &BTreeMap<String, FeatureSet>) -> Result<CycleOutcome, RankingError> {
        let cycle_id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (valid, skipped) = self.prepare(batch);
        info!(cycle_id, candidates = valid.len(), skipped = skipped.len(), "discovery cycle started");

        let ranked = self.rank_valid(&valid)?;

        let max_concurrency = self.config.squeeze.max_concurrency.max(1);
        let detector = &self.detector;
        // Stop feeding new instruments once a newer cycle has started.
        let mut assessments: Vec<SqueezeAssessment> = stream::iter(valid.iter())
            .take_while(|_| future::ready(self.is_current(cycle_id)))
            .map(|features| detector.analyze(features))
            .buffer_unordered(max_concurrency)
            .collect()
            .await;
        assessments.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        if !self.is_current(cycle_id) {
            warn!(
                cycle_id,
                latest = self.generation.load(Ordering::SeqCst),
                "cycle superseded, discarding results"
            );
            return Ok(CycleOutcome::Superseded { cycle_id });
        }

        self.write_through(&valid, &ranked, &assessments);

        info!(
            cycle_id,
            ranked = ranked.len(),
            top = ranked.first().map(|s| s.symbol.as_str()).unwrap_or("-"),
            top_score = ranked.first().map(|s| format!("{:.2}", s.score)).unwrap_or_default(),
            "discovery cycle complete"
        );

        Ok(CycleOutcome::Completed(CycleReport {
            id: Uuid::new_v4(),
            cycle_id,
            ranked,
            assessments,
            skipped,
            completed_at: Utc::now(),
        }))
    }

    fn write_through(&self, valid: &[FeatureSet], ranked: &[CompositeScore], assessments: &[SqueezeAssessment]) {
        let scores: BTreeMap<&str, &CompositeScore> = ranked.iter().map(|s| (s.symbol.as_str(), s)).collect();
        let squeezes: BTreeMap<&str, &SqueezeAssessment> =
            assessments.iter().map(|a| (a.symbol.as_str(), a)).collect();

        for features in valid {
            let symbol = features.symbol.as_str();
            let payload = json!({
                "score": scores.get(symbol),
                "squeeze": squeezes.get(symbol),
            });
            let metrics = CacheMetrics::new(features.aux.volume_spike, features.aux.volatility());
            let ttl = self.cache.set_with_dynamic_ttl(symbol, payload, metrics);
            debug!(symbol, ttl_secs = ttl.as_secs(), "cached cycle result");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::squeeze::{AtmOptionsData, OptionsDataProvider};
    use crate::types::Factor;

    fn instrument(symbol: &str, momentum: f64) -> FeatureSet {
        let mut fs = FeatureSet::new(symbol);
        fs.sector = Some("Tech".to_string());
        fs.shares_outstanding = Some(10_000_000.0);
        fs.factors.set(Factor::Momentum, Some(momentum));
        fs.aux.volume_spike = Some(momentum);
        fs
    }

    fn spread_batch() -> BTreeMap<String, FeatureSet> {
        [("AAA", 1.0), ("BBB", 2.0), ("CCC", 3.0), ("DDD", 4.0), ("EEE", 5.0)]
            .into_iter()
            .map(|(s, m)| (s.to_string(), instrument(s, m)))
            .collect()
    }

    #[test]
    fn rank_orders_by_momentum_and_reports_skips() {
        let engine = RankingEngine::new(RankerConfig::default(), SqueezeProviders::none());
        let mut batch = spread_batch();
        let mut bad = instrument("BAD", 2.0);
        bad.aux.price = Some(-1.0);
        batch.insert("BAD".to_string(), bad);
        batch.insert("KEY".to_string(), instrument("OTHER", 3.0));

        let result = engine.rank(&batch).unwrap();
        assert_eq!(result.ranked.len(), 5);
        assert_eq!(result.ranked[0].symbol, "EEE");
        assert_eq!(result.ranked[0].rank, 1);
        assert_eq!(result.ranked[4].symbol, "AAA");

        let skipped: Vec<&str> = result.skipped.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(skipped, vec!["BAD", "KEY"]);
    }

    #[tokio::test]
    async fn cycle_writes_through_cache() {
        let engine = RankingEngine::new(RankerConfig::default(), SqueezeProviders::none());
        let outcome = engine.run_cycle(&spread_batch()).await.unwrap();

        let report = match outcome {
            CycleOutcome::Completed(report) => report,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(report.cycle_id, 1);
        assert_eq!(report.ranked.len(), 5);
        assert_eq!(report.assessments.len(), 5);
        assert_eq!(report.assessments[0].symbol, "AAA");

        let lookup = engine.cached("EEE");
        assert!(lookup.cache_hit);
        let payload = lookup.data.unwrap();
        assert_eq!(payload["score"]["symbol"], "EEE");
        assert_eq!(payload["squeeze"]["symbol"], "EEE");
        assert_eq!(engine.cache_stats().entries, 5);
    }

    #[tokio::test]
    async fn flat_batch_fails_the_cycle() {
        let engine = RankingEngine::new(RankerConfig::default(), SqueezeProviders::none());
        let batch: BTreeMap<String, FeatureSet> = ["X1", "X2"]
            .into_iter()
            .map(|s| (s.to_string(), FeatureSet::new(s)))
            .collect();

        let err = engine.run_cycle(&batch).await.unwrap_err();
        assert!(err.is_distribution());
        assert_eq!(engine.cache_stats().entries, 0);
    }

    struct SlowOptions;

    #[async_trait]
    impl OptionsDataProvider for SlowOptions {
        async fn get_atm_options_data(
            &self,
            _symbol: &str,
            _price: Option<f64>,
        ) -> Result<Option<AtmOptionsData>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    #[derive(Default)]
    struct CountingSlowOptions {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OptionsDataProvider for CountingSlowOptions {
        async fn get_atm_options_data(
            &self,
            _symbol: &str,
            _price: Option<f64>,
        ) -> Result<Option<AtmOptionsData>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_cycle_stops_dispatching_detections() {
        let mut config = RankerConfig::default();
        config.squeeze.provider_timeout_ms = 250;
        config.squeeze.max_concurrency = 1;
        let options = Arc::new(CountingSlowOptions::default());
        let engine = RankingEngine::new(config, SqueezeProviders::none().with_options(options.clone()));
        let batch = spread_batch();

        let (first, second) = tokio::join!(engine.run_cycle(&batch), engine.run_cycle(&batch));

        assert!(matches!(first.unwrap(), CycleOutcome::Superseded { cycle_id: 1 }));
        assert!(matches!(second.unwrap(), CycleOutcome::Completed(_)));
        // The stale cycle analysed only the instrument already in flight.
        assert_eq!(options.calls.load(Ordering::SeqCst), 1 + batch.len());
    }

    #[tokio::test]
    async fn cycle_report_serialises_with_status_and_id() {
        let engine = RankingEngine::new(RankerConfig::default(), SqueezeProviders::none());
        let outcome = engine.run_cycle(&spread_batch()).await.unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        let id = json["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(json["ranked"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_cycle_supersedes_older_one() {
        let mut config = RankerConfig::default();
        config.squeeze.provider_timeout_ms = 250;
        let engine = RankingEngine::new(config, SqueezeProviders::none().with_options(Arc::new(SlowOptions)));
        let batch = spread_batch();

        let (first, second) = tokio::join!(engine.run_cycle(&batch), engine.run_cycle(&batch));

        assert!(matches!(first.unwrap(), CycleOutcome::Superseded { cycle_id: 1 }));
        match second.unwrap() {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.cycle_id, 2);
                assert!(report.assessments.iter().all(|a| !a.degraded.is_empty()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
