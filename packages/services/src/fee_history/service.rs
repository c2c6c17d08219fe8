use std::sync::Arc;

use metrics::{RegistersMetrics, prometheus::core::Collector};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    FeeHistoryConfig,
    block_stats::BlockFeeStats,
    cache::BlockStatsCache,
    fetcher::{BlockFetcher, FetchError},
    percentiles::validate_percentiles,
    port::{BlockNumberOrTag, BlockTag, ChainBackend, FeeHistory},
};
use crate::{Error, Result};

/// Answers fee history queries for a chain reachable through a
/// [`ChainBackend`], sharing one [`BlockStatsCache`] across queries.
#[derive(Debug, Clone)]
pub struct FeeHistoryResolver<B> {
    fetcher: BlockFetcher<B>,
    config: FeeHistoryConfig,
}

impl<B> FeeHistoryResolver<B> {
    pub fn new(backend: B, config: FeeHistoryConfig, cache: BlockStatsCache) -> Self {
        Self {
            fetcher: BlockFetcher::new(backend, cache),
            config,
        }
    }

    pub const fn config(&self) -> &FeeHistoryConfig {
        &self.config
    }
}

impl<B: ChainBackend + Sync> FeeHistoryResolver<B> {
    /// Fee history for up to `block_count` blocks ending at `newest_block`.
    ///
    /// The window is silently shortened by the configured history limits and
    /// by genesis. When the pending block is requested but the chain has
    /// none, the window ends at the latest block and is one block shorter.
    pub async fn fee_history(
        &self,
        cancel: &CancellationToken,
        block_count: u64,
        newest_block: BlockNumberOrTag,
        percentiles: &[f64],
    ) -> Result<FeeHistory> {
        validate_percentiles(percentiles)?;

        if block_count == 0 {
            return Ok(FeeHistory::default());
        }

        let Some((last_block, block_count)) = self.resolve_newest(newest_block, block_count).await?
        else {
            debug!("no pending block and nothing older requested, returning empty history");
            return Ok(FeeHistory::default());
        };

        let limit = self.config.history_limit(!percentiles.is_empty());
        let block_count = block_count.min(limit).min(last_block.saturating_add(1));
        if block_count == 0 {
            return Ok(FeeHistory::default());
        }

        if let BlockNumberOrTag::Number(requested) = newest_block {
            let head = self.backend().head_height().await?;
            if requested > head {
                return Err(Error::RequestBeyondHead { requested, head });
            }
        }

        let oldest_block = last_block - (block_count - 1);
        debug!("serving fee history for blocks {oldest_block}..={last_block}");

        let stats = match self
            .fetcher
            .fetch(cancel, oldest_block..=last_block, percentiles)
            .await
        {
            Ok(stats) => stats,
            Err(FetchError::Failed(error)) => return Err(error),
            Err(FetchError::Missing { height }) => return Err(self.vanished(height).await),
        };

        Ok(assemble(oldest_block, &stats, !percentiles.is_empty()))
    }

    /// Concrete last block and the count still to be served, `None` when
    /// nothing is left to serve.
    async fn resolve_newest(
        &self,
        newest_block: BlockNumberOrTag,
        block_count: u64,
    ) -> Result<Option<(u64, u64)>> {
        let tag = match newest_block {
            BlockNumberOrTag::Number(height) => return Ok(Some((height, block_count))),
            BlockNumberOrTag::Tag(tag) => tag,
        };

        if let Some(height) = self.backend().resolve_tag(tag).await? {
            return Ok(Some((height, block_count)));
        }

        match tag {
            BlockTag::Pending => {
                let remaining = block_count - 1;
                if remaining == 0 {
                    return Ok(None);
                }

                let latest = self
                    .backend()
                    .resolve_tag(BlockTag::Latest)
                    .await?
                    .ok_or_else(|| Error::Retrieval("chain has no latest block".to_owned()))?;
                debug!("no pending block, serving {remaining} blocks up to latest ({latest})");

                Ok(Some((latest, remaining)))
            }
            tag => Err(Error::Retrieval(format!("no block is tagged '{tag}'"))),
        }
    }

    async fn vanished(&self, height: u64) -> Error {
        match self.backend().head_height().await {
            Ok(head) if height >= head => Error::RequestBeyondHead {
                requested: height,
                head,
            },
            Ok(_) => Error::Retrieval(format!("block {height} disappeared while being fetched")),
            Err(error) => error,
        }
    }

    fn backend(&self) -> &B {
        self.fetcher.backend()
    }
}

fn assemble(oldest_block: u64, stats: &[Arc<BlockFeeStats>], with_rewards: bool) -> FeeHistory {
    let mut base_fee_per_gas: Vec<u128> = stats.iter().map(|s| s.base_fee).collect();
    base_fee_per_gas.extend(stats.last().map(|s| s.next_base_fee));

    let reward = with_rewards.then(|| {
        stats
            .iter()
            .map(|s| s.reward_values().map(<[u128]>::to_vec).unwrap_or_default())
            .collect()
    });

    FeeHistory {
        oldest_block,
        reward,
        base_fee_per_gas,
        gas_used_ratio: stats.iter().map(|s| s.gas_used_ratio).collect(),
    }
}

impl<B> RegistersMetrics for FeeHistoryResolver<B> {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        self.fetcher.metrics()
    }
}
