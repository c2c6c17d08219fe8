use super::{port::Block, rewards::compute_rewards};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRewards {
    /// Percentiles the rewards were computed for.
    pub percentiles: Vec<f64>,
    /// One reward per percentile, same order.
    pub values: Vec<u128>,
}

/// Everything fee history needs to know about a single block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFeeStats {
    pub base_fee: u128,
    pub next_base_fee: u128,
    pub gas_used_ratio: f64,
    pub rewards: Option<BlockRewards>,
}

impl BlockFeeStats {
    pub fn build(block: &Block, percentiles: &[f64]) -> Self {
        let rewards = (!percentiles.is_empty()).then(|| BlockRewards {
            percentiles: percentiles.to_vec(),
            values: compute_rewards(block.base_fee, &block.transactions, percentiles),
        });

        Self {
            base_fee: block.base_fee,
            next_base_fee: block.next_base_fee,
            gas_used_ratio: gas_used_ratio(block.gas_used, block.gas_limit),
            rewards,
        }
    }

    /// Whether this record can answer a request for `percentiles` without
    /// recomputation.
    pub fn serves(&self, percentiles: &[f64]) -> bool {
        percentiles.is_empty()
            || self
                .rewards
                .as_ref()
                .is_some_and(|rewards| rewards.percentiles == percentiles)
    }

    pub fn reward_values(&self) -> Option<&[u128]> {
        self.rewards.as_ref().map(|rewards| rewards.values.as_slice())
    }
}

fn gas_used_ratio(gas_used: u64, gas_limit: u64) -> f64 {
    if gas_limit == 0 {
        return 0.0;
    }

    gas_used as f64 / gas_limit as f64
}
