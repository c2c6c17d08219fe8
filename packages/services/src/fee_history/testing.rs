use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::port::{Block, BlockHash, BlockTag, ChainBackend, Transaction};
use crate::{Error, Result};

pub const GWEI: u128 = 1_000_000_000;
pub const GAS_LIMIT: u64 = 8_000_000;

/// Hash of the block at `height` produced by the `generation`-th version of
/// the chain. Every reorg bumps the generation.
pub fn block_hash(height: u64, generation: u8) -> BlockHash {
    let mut hash = [0xfe; 32];
    hash[..8].copy_from_slice(&height.to_be_bytes());
    hash[8] = generation;
    hash
}

fn base_fee(height: u64, generation: u8) -> u128 {
    GWEI + u128::from(height) * 1_000 + u128::from(generation) * 1_000_000
}

/// Between one and four transactions paying a tip of 1 to 3 gwei, seeded by
/// the block identity so the same block always looks the same.
fn generate_block(height: u64, generation: u8) -> Block {
    let mut rng = StdRng::seed_from_u64(height ^ (u64::from(generation) << 56));
    let fee = base_fee(height, generation);

    let transactions = (0..rng.gen_range(1..=4))
        .map(|_| Transaction {
            effective_gas_price: fee + GWEI * rng.gen_range(1..=3u128),
            gas_used: 21_000 * rng.gen_range(1..=5u64),
        })
        .collect::<Vec<_>>();

    Block {
        hash: block_hash(height, generation),
        height,
        gas_used: transactions.iter().map(|tx| tx.gas_used).sum(),
        gas_limit: GAS_LIMIT,
        base_fee: fee,
        next_base_fee: base_fee(height + 1, generation),
        transactions,
    }
}

#[derive(Debug, Default)]
struct State {
    blocks: Vec<Block>,
    pending: Option<Block>,
    generation: u8,
    latencies: HashMap<u64, Duration>,
    failing: HashSet<u64>,
}

impl State {
    fn head(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn find(&self, hash: &BlockHash) -> Option<&Block> {
        let height = u64::from_be_bytes(hash[..8].try_into().expect("8 bytes"));
        self.blocks
            .get(height as usize)
            .into_iter()
            .chain(self.pending.as_ref())
            .find(|block| &block.hash == hash)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    block_requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// In-memory chain with heights `0..=head`, optionally followed by a pending
/// block. Clones share the same chain, so a test can keep a handle for
/// inspection and mutation after handing one to the code under test.
#[derive(Debug, Clone, Default)]
pub struct TestChain {
    inner: Arc<Inner>,
}

impl TestChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.state().blocks = (0..=head).map(|height| generate_block(height, 0)).collect();
        chain
    }

    pub fn with_pending(self) -> Self {
        {
            let mut state = self.state();
            let height = state.head() + 1;
            state.pending = Some(generate_block(height, state.generation));
        }
        self
    }

    pub fn head(&self) -> u64 {
        self.state().head()
    }

    /// The canonical (or pending) block at `height`.
    pub fn block(&self, height: u64) -> Block {
        let state = self.state();
        state
            .blocks
            .get(height as usize)
            .or(state.pending.as_ref().filter(|block| block.height == height))
            .cloned()
            .unwrap_or_else(|| panic!("no block at height {height}"))
    }

    /// Replaces every block from `from` on with a fresh fork ending at
    /// `new_head`. A pending block, if present, moves on top of the fork.
    pub fn reorg(&self, from: u64, new_head: u64) {
        let mut state = self.state();
        state.generation += 1;
        let generation = state.generation;

        state.blocks.truncate(from as usize);
        state
            .blocks
            .extend((from..=new_head).map(|height| generate_block(height, generation)));

        if state.pending.is_some() {
            state.pending = Some(generate_block(new_head + 1, generation));
        }
    }

    /// Delays every `block_by_hash` for `height` by `latency`.
    pub fn set_block_latency(&self, height: u64, latency: Duration) {
        self.state().latencies.insert(height, latency);
    }

    /// Makes `block_by_hash` for `height` fail with a retrieval error.
    pub fn fail_block(&self, height: u64) {
        self.state().failing.insert(height);
    }

    /// Number of `block_by_hash` calls served so far.
    pub fn block_requests(&self) -> usize {
        self.inner.block_requests.load(Ordering::SeqCst)
    }

    /// Highest number of `block_by_hash` calls observed in flight at once.
    pub fn max_concurrent_block_requests(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().expect("test chain lock poisoned")
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ChainBackend for TestChain {
    async fn resolve_tag(&self, tag: BlockTag) -> Result<Option<u64>> {
        let state = self.state();
        let head = state.head();

        let height = match tag {
            BlockTag::Latest => Some(head),
            BlockTag::Pending => state.pending.as_ref().map(|block| block.height),
            BlockTag::Safe => Some(head.saturating_sub(1)),
            BlockTag::Finalized => Some(head.saturating_sub(2)),
        };

        Ok(height)
    }

    async fn head_height(&self) -> Result<u64> {
        Ok(self.head())
    }

    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>> {
        let state = self.state();
        let hash = state
            .blocks
            .get(height as usize)
            .or(state.pending.as_ref().filter(|block| block.height == height))
            .map(|block| block.hash);

        Ok(hash)
    }

    async fn block_by_hash(&self, hash: BlockHash, with_transactions: bool) -> Result<Option<Block>> {
        self.inner.block_requests.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.inner.in_flight, &self.inner.max_in_flight);

        let height = u64::from_be_bytes(hash[..8].try_into().expect("8 bytes"));
        let (latency, failing) = {
            let state = self.state();
            (
                state.latencies.get(&height).copied(),
                state.failing.contains(&height),
            )
        };

        // yields even without latency so concurrent requests interleave
        tokio::time::sleep(latency.unwrap_or_default()).await;

        if failing {
            return Err(Error::Retrieval(format!("block {height} unavailable")));
        }

        let block = self.state().find(&hash).cloned().map(|mut block| {
            if !with_transactions {
                block.transactions.clear();
            }
            block
        });

        Ok(block)
    }
}
