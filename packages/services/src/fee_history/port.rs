use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub type BlockHash = [u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Latest,
    Pending,
    Finalized,
    Safe,
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Latest => "latest",
            Self::Pending => "pending",
            Self::Finalized => "finalized",
            Self::Safe => "safe",
        };
        f.write_str(tag)
    }
}

/// The newest block of a fee history request. Literal heights are used as
/// given, symbolic tags are resolved by the [`ChainBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockNumberOrTag {
    Number(u64),
    Tag(BlockTag),
}

impl From<u64> for BlockNumberOrTag {
    fn from(height: u64) -> Self {
        Self::Number(height)
    }
}

impl From<BlockTag> for BlockNumberOrTag {
    fn from(tag: BlockTag) -> Self {
        Self::Tag(tag)
    }
}

impl fmt::Display for BlockNumberOrTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(height) => write!(f, "{height}"),
            Self::Tag(tag) => write!(f, "{tag}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBlockNumber(String);

impl std::error::Error for InvalidBlockNumber {}

impl fmt::Display for InvalidBlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid block number or tag: '{}'", self.0)
    }
}

impl FromStr for BlockNumberOrTag {
    type Err = InvalidBlockNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "latest" => BlockTag::Latest,
            "pending" => BlockTag::Pending,
            "finalized" => BlockTag::Finalized,
            "safe" => BlockTag::Safe,
            _ => {
                let height = match s.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                return height
                    .map(Self::Number)
                    .map_err(|_| InvalidBlockNumber(s.to_owned()));
            }
        };

        Ok(Self::Tag(tag))
    }
}

impl<'de> Deserialize<'de> for BlockNumberOrTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(height) => Ok(Self::Number(height)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// Price per gas actually paid, base fee included.
    pub effective_gas_price: u128,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub hash: BlockHash,
    pub height: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee: u128,
    /// Base fee of the child block, projected when this block is the head.
    pub next_base_fee: u128,
    /// Empty when the block was requested without transactions.
    pub transactions: Vec<Transaction>,
}

/// Fee history for a contiguous, ascending window of blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    pub oldest_block: u64,
    /// One row per block, one column per requested percentile. `None` when no
    /// percentiles were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Vec<Vec<u128>>>,
    /// Base fees of the window plus the base fee of the block after it.
    pub base_fee_per_gas: Vec<u128>,
    pub gas_used_ratio: Vec<f64>,
}

impl FeeHistory {
    pub fn block_count(&self) -> usize {
        self.gas_used_ratio.len()
    }
}

#[allow(async_fn_in_trait)]
#[trait_variant::make(Send)]
#[cfg_attr(feature = "test-helpers", mockall::automock)]
pub trait ChainBackend {
    /// `None` signals that no block carries the tag yet, e.g. no pending block.
    async fn resolve_tag(&self, tag: BlockTag) -> crate::Result<Option<u64>>;
    async fn head_height(&self) -> crate::Result<u64>;
    async fn block_hash_at(&self, height: u64) -> crate::Result<Option<BlockHash>>;
    async fn block_by_hash(
        &self,
        hash: BlockHash,
        with_transactions: bool,
    ) -> crate::Result<Option<Block>>;
}
