use std::{ops::RangeInclusive, sync::Arc};

use futures::{StreamExt, TryStreamExt, stream};
use metrics::{
    RegistersMetrics, int_counter,
    prometheus::{IntCounter, core::Collector},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    block_stats::BlockFeeStats,
    cache::BlockStatsCache,
    port::{BlockHash, ChainBackend},
};
use crate::Error;

/// Upper bound on concurrent backend requests issued for one window.
pub const MAX_BLOCK_FETCHERS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The chain has no block at `height` anymore, usually because a reorg
    /// shortened it while the window was being fetched.
    Missing { height: u64 },
    Failed(Error),
}

impl From<Error> for FetchError {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

enum Lookup {
    Cached(Arc<BlockFeeStats>),
    Missed { height: u64, hash: BlockHash },
}

#[derive(Debug, Clone)]
struct Metrics {
    blocks_fetched: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            blocks_fetched: int_counter(
                "fee_history_blocks_fetched",
                "Number of blocks retrieved from the chain to build fee stats",
            ),
        }
    }
}

/// Produces fee stats for a window of heights, serving what it can from the
/// cache and fetching the rest with a bounded number of concurrent requests.
#[derive(Debug, Clone)]
pub struct BlockFetcher<B> {
    backend: B,
    cache: BlockStatsCache,
    metrics: Metrics,
}

impl<B> BlockFetcher<B> {
    pub fn new(backend: B, cache: BlockStatsCache) -> Self {
        Self {
            backend,
            cache,
            metrics: Metrics::default(),
        }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn cache(&self) -> &BlockStatsCache {
        &self.cache
    }
}

impl<B: ChainBackend + Sync> BlockFetcher<B> {
    /// Stats for every height in `window`, in ascending height order.
    ///
    /// Fails as a whole on the first error or when `cancel` fires; partially
    /// fetched windows are never returned.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        window: RangeInclusive<u64>,
        percentiles: &[f64],
    ) -> Result<Vec<Arc<BlockFeeStats>>, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Failed(Error::Cancelled)),
            stats = self.fetch_window(window, percentiles) => stats,
        }
    }

    async fn fetch_window(
        &self,
        window: RangeInclusive<u64>,
        percentiles: &[f64],
    ) -> Result<Vec<Arc<BlockFeeStats>>, FetchError> {
        let lookups: Vec<Lookup> = stream::iter(window)
            .map(|height| self.lookup(height, percentiles))
            .buffered(MAX_BLOCK_FETCHERS)
            .try_collect()
            .await?;

        let mut slots: Vec<Option<Arc<BlockFeeStats>>> = vec![None; lookups.len()];
        let mut misses = vec![];
        for (position, lookup) in lookups.into_iter().enumerate() {
            match lookup {
                Lookup::Cached(stats) => slots[position] = Some(stats),
                Lookup::Missed { height, hash } => misses.push((position, height, hash)),
            }
        }

        debug!(
            "serving {} blocks from cache, fetching {}",
            slots.len() - misses.len(),
            misses.len()
        );

        let mut fetched = stream::iter(misses)
            .map(|(position, height, hash)| async move {
                let stats = self.fetch_stats(height, hash, percentiles).await?;
                Ok::<_, FetchError>((position, stats))
            })
            .buffer_unordered(MAX_BLOCK_FETCHERS);

        while let Some((position, stats)) = fetched.try_next().await? {
            slots[position] = Some(stats);
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("every position is filled by a cache hit or a fetch"))
            .collect())
    }

    async fn lookup(&self, height: u64, percentiles: &[f64]) -> Result<Lookup, FetchError> {
        let hash = self
            .backend
            .block_hash_at(height)
            .await?
            .ok_or(FetchError::Missing { height })?;

        let lookup = match self.cache.get(&hash, percentiles).await {
            Some(stats) => Lookup::Cached(stats),
            None => Lookup::Missed { height, hash },
        };

        Ok(lookup)
    }

    async fn fetch_stats(
        &self,
        height: u64,
        hash: BlockHash,
        percentiles: &[f64],
    ) -> Result<Arc<BlockFeeStats>, FetchError> {
        let with_transactions = !percentiles.is_empty();
        let block = self
            .backend
            .block_by_hash(hash, with_transactions)
            .await?
            .ok_or(FetchError::Missing { height })?;
        self.metrics.blocks_fetched.inc();

        let stats = Arc::new(BlockFeeStats::build(&block, percentiles));
        self.cache.insert(hash, Arc::clone(&stats)).await;

        Ok(stats)
    }
}

impl<B> RegistersMetrics for BlockFetcher<B> {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        let mut metrics = self.cache.metrics();
        metrics.push(Box::new(self.metrics.blocks_fetched.clone()));
        metrics
    }
}
