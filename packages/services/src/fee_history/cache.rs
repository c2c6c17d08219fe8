use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use metrics::{
    RegistersMetrics, int_counter,
    prometheus::{IntCounter, core::Collector},
};
use tokio::sync::Mutex;

use super::{block_stats::BlockFeeStats, port::BlockHash};

#[derive(Debug, Clone)]
struct Metrics {
    hits: IntCounter,
    misses: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            hits: int_counter(
                "fee_history_cache_hits",
                "Number of block fee stats served from the cache",
            ),
            misses: int_counter(
                "fee_history_cache_misses",
                "Number of block fee stats that had to be fetched from the chain",
            ),
        }
    }
}

/// Block fee stats keyed by block hash. Clones share the same store.
///
/// Entries are never invalidated: a reorg changes the hash found at a height,
/// so stale stats simply stop being looked up and age out of the LRU.
#[derive(Debug, Clone)]
pub struct BlockStatsCache {
    // preferred over RwLock because lookups reorder the LRU and need &mut
    entries: Arc<Mutex<LruCache<BlockHash, Arc<BlockFeeStats>>>>,
    metrics: Metrics,
}

impl BlockStatsCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            metrics: Metrics::default(),
        }
    }

    /// Stats for `hash`, provided they were computed for `percentiles`.
    pub async fn get(&self, hash: &BlockHash, percentiles: &[f64]) -> Option<Arc<BlockFeeStats>> {
        let found = self
            .entries
            .lock()
            .await
            .get(hash)
            .filter(|stats| stats.serves(percentiles))
            .cloned();

        match found {
            Some(_) => self.metrics.hits.inc(),
            None => self.metrics.misses.inc(),
        }

        found
    }

    pub async fn insert(&self, hash: BlockHash, stats: Arc<BlockFeeStats>) {
        self.entries.lock().await.put(hash, stats);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl RegistersMetrics for BlockStatsCache {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.metrics.hits.clone()),
            Box::new(self.metrics.misses.clone()),
        ]
    }
}
