use alloy::{
    eips::{
        BlockId, BlockNumberOrTag as EthBlockNumberOrTag,
        eip1559::{BaseFeeParams, calc_next_block_base_fee},
    },
    primitives::B256,
    providers::{Provider, RootProvider},
    rpc::types::{Header, TransactionReceipt},
    transports::TransportResult,
};
use metrics::{
    ConnectionHealthTracker, HealthChecker, RegistersMetrics, prometheus::core::Collector,
};
use services::{Block, BlockHash, BlockTag, ChainBackend, Transaction};
use tracing::{debug, warn};
use url::Url;

use crate::{error::Error, metrics::Metrics};

/// [`ChainBackend`] over an Ethereum JSON-RPC node reached through HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    provider: RootProvider,
    metrics: Metrics,
    health_tracker: ConnectionHealthTracker,
}

impl HttpClient {
    #[must_use]
    pub fn new(url: Url, unhealthy_after_n_errors: usize) -> Self {
        Self {
            provider: RootProvider::new_http(url),
            metrics: Metrics::default(),
            health_tracker: ConnectionHealthTracker::new(unhealthy_after_n_errors),
        }
    }

    #[must_use]
    pub fn connection_health_checker(&self) -> HealthChecker {
        self.health_tracker.tracker()
    }

    async fn header(&self, number: EthBlockNumberOrTag) -> crate::Result<Option<Header>> {
        let block = self.track(self.provider.get_block_by_number(number).await)?;

        Ok(block.map(|block| block.header))
    }

    async fn receipts(&self, hash: B256) -> crate::Result<Option<Vec<TransactionReceipt>>> {
        self.track(self.provider.get_block_receipts(BlockId::hash(hash)).await)
    }

    fn track<T>(&self, response: TransportResult<T>) -> crate::Result<T> {
        match response {
            Ok(value) => {
                self.handle_network_success();
                Ok(value)
            }
            Err(err) => {
                let err = Error::from(err);
                if err.is_network() {
                    self.handle_network_error();
                } else {
                    self.handle_network_success();
                }
                warn!("eth request failed: {err}");
                Err(err)
            }
        }
    }

    fn handle_network_error(&self) {
        self.health_tracker.note_failure();
        self.metrics.eth_network_errors.inc();
    }

    fn handle_network_success(&self) {
        self.health_tracker.note_success();
    }
}

fn fee_block(header: &Header, transactions: Vec<Transaction>) -> Block {
    let base_fee = header.base_fee_per_gas.unwrap_or_default();
    let next_base_fee = calc_next_block_base_fee(
        header.gas_used,
        header.gas_limit,
        base_fee,
        BaseFeeParams::ethereum(),
    );

    Block {
        hash: header.hash.0,
        height: header.number,
        gas_used: header.gas_used,
        gas_limit: header.gas_limit,
        base_fee: u128::from(base_fee),
        next_base_fee: u128::from(next_base_fee),
        transactions,
    }
}

impl ChainBackend for HttpClient {
    async fn resolve_tag(&self, tag: BlockTag) -> services::Result<Option<u64>> {
        let tag = match tag {
            BlockTag::Latest => EthBlockNumberOrTag::Latest,
            BlockTag::Finalized => EthBlockNumberOrTag::Finalized,
            BlockTag::Safe => EthBlockNumberOrTag::Safe,
            // nodes answer `pending` with their latest sealed block, which has
            // no pending fee data of its own
            BlockTag::Pending => return Ok(None),
        };

        let header = self.header(tag).await?;

        Ok(header.map(|header| header.number))
    }

    async fn head_height(&self) -> services::Result<u64> {
        let height = self.track(self.provider.get_block_number().await)?;
        self.metrics.eth_height.set(height as i64);

        Ok(height)
    }

    async fn block_hash_at(&self, height: u64) -> services::Result<Option<BlockHash>> {
        let header = self.header(EthBlockNumberOrTag::Number(height)).await?;

        Ok(header.map(|header| header.hash.0))
    }

    async fn block_by_hash(
        &self,
        hash: BlockHash,
        with_transactions: bool,
    ) -> services::Result<Option<Block>> {
        let hash = B256::from(hash);
        let Some(block) = self.track(self.provider.get_block_by_hash(hash).await)? else {
            return Ok(None);
        };

        if !with_transactions {
            return Ok(Some(fee_block(&block.header, vec![])));
        }

        let Some(receipts) = self.receipts(hash).await? else {
            debug!("receipts for block {hash} are gone, treating block as missing");
            return Ok(None);
        };

        let transactions = receipts
            .iter()
            .map(|receipt| Transaction {
                effective_gas_price: receipt.effective_gas_price,
                gas_used: receipt.gas_used,
            })
            .collect();

        Ok(Some(fee_block(&block.header, transactions)))
    }
}

impl RegistersMetrics for HttpClient {
    fn metrics(&self) -> Vec<Box<dyn Collector>> {
        self.metrics.metrics()
    }
}
