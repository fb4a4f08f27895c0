// =============================================================================
// Squeeze Scout — Main Entry Point
// =============================================================================
//
// Loads the ranker configuration, reads one batch of feature sets, runs a
// single discovery cycle and prints the cycle report as JSON.
//
//   SCOUT_CONFIG    config path   (default: ranker_config.json)
//   SCOUT_FEATURES  batch path    (default: features.json)
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use squeeze_scout::squeeze::HeuristicBorrowStress;
use squeeze_scout::{CycleOutcome, FeatureSet, RankerConfig, RankingEngine, SqueezeProviders};

/// A batch file is either symbol-keyed or a plain list.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Keyed(BTreeMap<String, FeatureSet>),
    List(Vec<FeatureSet>),
}

impl BatchFile {
    fn into_batch(self) -> BTreeMap<String, FeatureSet> {
        match self {
            Self::Keyed(map) => map,
            Self::List(list) => list.into_iter().map(|fs| (fs.symbol.clone(), fs)).collect(),
        }
    }
}

fn load_batch(path: &Path) -> Result<BTreeMap<String, FeatureSet>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read feature batch from {}", path.display()))?;
    let file: BatchFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse feature batch {}", path.display()))?;
    Ok(file.into_batch())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Squeeze Scout starting up");

    let config_path =
        std::env::var("SCOUT_CONFIG").unwrap_or_else(|_| "ranker_config.json".to_string());
    let config = RankerConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(path = %config_path, error = %e, "Failed to load config, using defaults");
        RankerConfig::default()
    });

    // ── 2. Batch ─────────────────────────────────────────────────────────
    let features_path =
        std::env::var("SCOUT_FEATURES").unwrap_or_else(|_| "features.json".to_string());
    let batch = load_batch(Path::new(&features_path))?;
    info!(path = %features_path, instruments = batch.len(), "Loaded feature batch");

    // ── 3. Engine ────────────────────────────────────────────────────────
    let providers = SqueezeProviders::none().with_borrow_stress(Arc::new(HeuristicBorrowStress));
    let engine = RankingEngine::new(config, providers);

    // ── 4. One discovery cycle ───────────────────────────────────────────
    let outcome = engine
        .run_cycle(&batch)
        .await
        .context("discovery cycle failed")?;

    if let CycleOutcome::Completed(report) = &outcome {
        if !report.skipped.is_empty() {
            warn!(skipped = report.skipped.len(), "Some instruments were skipped");
        }
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let stats = engine.cache_stats();
    info!(entries = stats.entries, "Cycle results cached");
    Ok(())
}
