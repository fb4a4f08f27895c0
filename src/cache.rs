// =============================================================================
// Adaptive Cache — per-symbol payloads with volatility-derived TTL
// =============================================================================
//
// Fast-moving symbols expire quickly, quiet ones linger:
//
//   squeeze   spike >= 10 AND volatility >= 0.10    30 s
//   volatile  spike >=  5 OR  volatility >= 0.05    60 s
//   active    spike >=  2 OR  volatility >= 0.03   120 s
//   normal    spike >=  1 OR  volatility >= 0.01   300 s
//   quiet     everything else                      600 s
//
// Entries are overwritten, never mutated.  Expiry is checked under the store
// lock on every read; an expired read counts as a miss and evicts the entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::runtime_config::CacheParams;

/// The two metrics TTL is derived from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub volume_spike: f64,
    /// Fractional volatility (0.10 = 10 %).
    pub volatility: f64,
}

impl CacheMetrics {
    pub fn new(volume_spike: Option<f64>, volatility: Option<f64>) -> Self {
        Self {
            volume_spike: volume_spike.unwrap_or(0.0),
            volatility: volatility.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Squeeze,
    Volatile,
    Active,
    Normal,
    Quiet,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squeeze => write!(f, "squeeze"),
            Self::Volatile => write!(f, "volatile"),
            Self::Active => write!(f, "active"),
            Self::Normal => write!(f, "normal"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

struct CacheEntry<V> {
    payload: V,
    expires_at: Instant,
    cached_at: DateTime<Utc>,
    tier: CacheTier,
}

/// Result of a cache read.
#[derive(Debug, Clone, Serialize)]
pub struct CacheLookup<V> {
    pub data: Option<V>,
    pub cache_hit: bool,
    /// When the payload was written, for hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<CacheTier>,
}

impl<V> CacheLookup<V> {
    fn miss() -> Self {
        Self {
            data: None,
            cache_hit: false,
            cached_at: None,
            tier: None,
        }
    }
}

/// Immutable snapshot of cache counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

pub struct AdaptiveCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    params: CacheParams,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> AdaptiveCache<V> {
    pub fn new(params: CacheParams) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            params,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // TTL policy
    // -------------------------------------------------------------------------

    /// Tier for the given metrics.  Non-finite inputs count as 0.
    pub fn tier_for(&self, volume_spike: f64, volatility: f64) -> CacheTier {
        let spike = finite_or_zero(volume_spike);
        let vol = finite_or_zero(volatility);
        let p = &self.params;

        if spike >= p.squeeze_min_spike && vol >= p.squeeze_min_volatility {
            CacheTier::Squeeze
        } else if spike >= p.volatile_min_spike || vol >= p.volatile_min_volatility {
            CacheTier::Volatile
        } else if spike >= p.active_min_spike || vol >= p.active_min_volatility {
            CacheTier::Active
        } else if spike >= p.normal_min_spike || vol >= p.normal_min_volatility {
            CacheTier::Normal
        } else {
            CacheTier::Quiet
        }
    }

    pub fn tier_ttl(&self, tier: CacheTier) -> Duration {
        let p = &self.params;
        let secs = match tier {
            CacheTier::Squeeze => p.squeeze_ttl_secs,
            CacheTier::Volatile => p.volatile_ttl_secs,
            CacheTier::Active => p.active_ttl_secs,
            CacheTier::Normal => p.normal_ttl_secs,
            CacheTier::Quiet => p.quiet_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Pure function of the two metrics; non-increasing in both.
    pub fn ttl_for(&self, volume_spike: f64, volatility: f64) -> Duration {
        self.tier_ttl(self.tier_for(volume_spike, volatility))
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Store `payload` under `key`, replacing any previous entry.  Returns the
    /// TTL applied.
    pub fn set_with_dynamic_ttl(
        &self,
        key: impl Into<String>,
        payload: V,
        metrics: CacheMetrics,
    ) -> Duration {
        self.set_at(key, payload, metrics, Instant::now())
    }

    fn set_at(&self, key: impl Into<String>, payload: V, metrics: CacheMetrics, now: Instant) -> Duration {
        let key = key.into();
        let tier = self.tier_for(metrics.volume_spike, metrics.volatility);
        let ttl = self.tier_ttl(tier);

        debug!(
            key = %key,
            %tier,
            ttl_secs = ttl.as_secs(),
            volume_spike = format!("{:.2}", metrics.volume_spike),
            volatility = format!("{:.3}", metrics.volatility),
            "cache write"
        );

        self.entries.write().insert(
            key,
            CacheEntry {
                payload,
                expires_at: now + ttl,
                cached_at: Utc::now(),
                tier,
            },
        );
        ttl
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every expired entry.  Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "pruned expired cache entries");
        }
        removed
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get_with_metrics(&self, key: &str) -> CacheLookup<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> CacheLookup<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return CacheLookup::miss();
                }
                Some(entry) if entry.expires_at > now => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return CacheLookup {
                        data: Some(entry.payload.clone()),
                        cache_hit: true,
                        cached_at: Some(entry.cached_at),
                        tier: Some(entry.tier),
                    };
                }
                Some(_) => {}
            }
        }

        // Expired under the read guard.  A writer may have refreshed the key
        // since, so evict only if it is still stale.
        let mut entries = self.entries.write();
        if entries.get(key).map_or(false, |e| e.expires_at <= now) {
            entries.remove(key);
            debug!(key, "cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        CacheLookup::miss()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            entries: self.entries.read().len(),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl<V: Clone> Default for AdaptiveCache<V> {
    fn default() -> Self {
        Self::new(CacheParams::default())
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> AdaptiveCache<String> {
        AdaptiveCache::default()
    }

    #[test]
    fn tier_boundaries() {
        let c = cache();
        assert_eq!(c.ttl_for(10.0, 0.10), Duration::from_secs(30));
        // Squeeze needs both; a spike alone is only volatile.
        assert_eq!(c.ttl_for(50.0, 0.0), Duration::from_secs(60));
        assert_eq!(c.ttl_for(0.0, 0.05), Duration::from_secs(60));
        assert_eq!(c.ttl_for(2.0, 0.0), Duration::from_secs(120));
        assert_eq!(c.ttl_for(0.0, 0.03), Duration::from_secs(120));
        assert_eq!(c.ttl_for(1.0, 0.0), Duration::from_secs(300));
        assert_eq!(c.ttl_for(0.5, 0.005), Duration::from_secs(600));
    }

    #[test]
    fn ttl_is_monotonic_in_both_metrics() {
        let c = cache();
        let spikes = [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 7.5, 10.0, 20.0];
        let vols = [0.0, 0.005, 0.01, 0.02, 0.03, 0.04, 0.05, 0.08, 0.10, 0.25];

        for &v in &vols {
            for w in spikes.windows(2) {
                assert!(c.ttl_for(w[1], v) <= c.ttl_for(w[0], v), "spike {w:?} vol {v}");
            }
        }
        for &s in &spikes {
            for w in vols.windows(2) {
                assert!(c.ttl_for(s, w[1]) <= c.ttl_for(s, w[0]), "spike {s} vol {w:?}");
            }
        }
    }

    #[test]
    fn non_finite_metrics_count_as_zero() {
        let c = cache();
        assert_eq!(c.ttl_for(f64::NAN, f64::INFINITY), Duration::from_secs(600));
        assert_eq!(c.tier_for(f64::NAN, 0.05), CacheTier::Volatile);
    }

    #[test]
    fn squeeze_entry_hits_then_expires() {
        let c = cache();
        let t0 = Instant::now();
        let ttl = c.set_at("GME", "payload".to_string(), CacheMetrics::new(Some(15.0), Some(0.15)), t0);
        assert!(ttl <= Duration::from_secs(30));

        let hit = c.get_at("GME", t0);
        assert!(hit.cache_hit);
        assert_eq!(hit.data.as_deref(), Some("payload"));
        assert_eq!(hit.tier, Some(CacheTier::Squeeze));

        let miss = c.get_at("GME", t0 + Duration::from_secs(31));
        assert!(!miss.cache_hit);
        assert!(miss.data.is_none());
        // Expired read evicted the entry.
        assert_eq!(c.stats().entries, 0);
    }

    #[test]
    fn overwrite_replaces_payload_and_ttl() {
        let c = cache();
        let t0 = Instant::now();
        c.set_at("AMC", "quiet".to_string(), CacheMetrics::default(), t0);
        c.set_at("AMC", "hot".to_string(), CacheMetrics::new(Some(12.0), Some(0.2)), t0);

        assert_eq!(c.get_at("AMC", t0).data.as_deref(), Some("hot"));
        assert!(!c.get_at("AMC", t0 + Duration::from_secs(60)).cache_hit);
    }

    #[test]
    fn stats_and_pruning() {
        let c = cache();
        let t0 = Instant::now();
        c.set_at("A", "a".to_string(), CacheMetrics::new(Some(20.0), Some(0.2)), t0);
        c.set_at("B", "b".to_string(), CacheMetrics::default(), t0);

        assert!(c.get_at("A", t0).cache_hit);
        assert!(!c.get_at("missing", t0).cache_hit);

        assert_eq!(c.prune_at(t0 + Duration::from_secs(45)), 1);
        let stats = c.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);

        assert!(c.invalidate("B"));
        assert!(!c.invalidate("B"));
    }

    #[test]
    fn lookups_do_not_exclude_each_other() {
        let c = cache();
        let t0 = Instant::now();
        c.set_at("TSLA", "x".to_string(), CacheMetrics::default(), t0);

        // An exclusive-read guard stands in for another lookup in flight.
        let in_flight = c.entries.upgradable_read();
        let hit = c.get_at("TSLA", t0);
        drop(in_flight);
        assert!(hit.cache_hit);
    }
}
