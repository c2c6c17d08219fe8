use std::num::NonZeroUsize;

use services::{
    BlockNumberOrTag, BlockTag, Error, FeeHistory, FeeHistoryConfig, FeeHistoryResolver, Result,
    fee_history::{cache::BlockStatsCache, testing::TestChain},
};
use test_case::test_case;
use tokio_util::sync::CancellationToken;

const HEAD: u64 = 32;

fn given_resolver(chain: &TestChain, config: FeeHistoryConfig) -> FeeHistoryResolver<TestChain> {
    FeeHistoryResolver::new(
        chain.clone(),
        config,
        BlockStatsCache::new(NonZeroUsize::new(256).unwrap()),
    )
}

async fn query(
    resolver: &FeeHistoryResolver<TestChain>,
    block_count: u64,
    newest_block: BlockNumberOrTag,
    percentiles: &[f64],
) -> Result<FeeHistory> {
    resolver
        .fee_history(&CancellationToken::new(), block_count, newest_block, percentiles)
        .await
}

fn limits(max_header_history: u64, max_block_history: u64) -> FeeHistoryConfig {
    FeeHistoryConfig {
        max_header_history,
        max_block_history,
    }
}

#[test_case(false, limits(1024, 1024), 1, BlockTag::Pending.into(), &[] => (0, 0); "pending without pending block and count one")]
#[test_case(false, limits(1024, 1024), 2, BlockTag::Pending.into(), &[] => (32, 1); "pending without pending block falls back to latest")]
#[test_case(true, limits(1024, 1024), 2, BlockTag::Pending.into(), &[] => (32, 2); "pending block is served")]
#[test_case(false, limits(1024, 1024), 1_000_000_000, 30.into(), &[] => (0, 31); "huge count is clamped to genesis")]
#[test_case(false, limits(1024, 1024), 1_000_000_000, BlockTag::Latest.into(), &[] => (0, 33); "whole chain")]
#[test_case(false, limits(1024, 1024), 5, BlockTag::Finalized.into(), &[] => (26, 5); "finalized tag")]
#[test_case(false, limits(20, 2), 100, BlockTag::Latest.into(), &[] => (13, 20); "header limit")]
#[test_case(false, limits(20, 2), 100, BlockTag::Latest.into(), &[0.0, 10.0] => (31, 2); "block limit when percentiles requested")]
#[test_case(false, limits(1024, 1024), 10, 30.into(), &[] => (21, 10); "ten blocks ending at thirty")]
#[test_case(false, limits(1024, 1024), 10, 30.into(), &[0.0, 10.0] => (21, 10); "ten blocks ending at thirty with rewards")]
#[test_case(false, limits(20, 2), 100, 32.into(), &[0.0, 10.0] => (31, 2); "block limit at literal head")]
#[test_case(false, limits(1024, 1024), 3, 0.into(), &[50.0] => (0, 1); "genesis only")]
#[test_case(false, limits(1024, 1024), 4, HEAD.into(), &[25.0] => (29, 4); "literal head")]
#[tokio::test]
async fn resolves_windows(
    with_pending: bool,
    config: FeeHistoryConfig,
    block_count: u64,
    newest_block: BlockNumberOrTag,
    percentiles: &[f64],
) -> (u64, usize) {
    // given
    let chain = TestChain::new(HEAD);
    let chain = if with_pending { chain.with_pending() } else { chain };
    let resolver = given_resolver(&chain, config);

    // when
    let history = query(&resolver, block_count, newest_block, percentiles)
        .await
        .unwrap();

    // then
    (history.oldest_block, history.block_count())
}

#[tokio::test]
async fn literal_height_past_head_is_rejected() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());

    // when
    let result = query(&resolver, 1, 40.into(), &[]).await;

    // then
    assert_eq!(
        result,
        Err(Error::RequestBeyondHead {
            requested: 40,
            head: HEAD
        })
    );
    assert_eq!(chain.block_requests(), 0);
}

#[tokio::test]
async fn literal_pending_height_is_not_treated_as_pending() {
    // given
    let chain = TestChain::new(HEAD).with_pending();
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());

    // when
    let result = query(&resolver, 1, (HEAD + 1).into(), &[]).await;

    // then
    assert!(matches!(result, Err(Error::RequestBeyondHead { .. })));
}

#[tokio::test]
async fn output_arrays_line_up_with_the_window() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());
    let percentiles = [0.0, 25.0, 50.0, 100.0];

    // when
    let history = query(&resolver, 10, 20.into(), &percentiles)
        .await
        .unwrap();

    // then
    assert_eq!(history.oldest_block, 11);
    assert_eq!(history.gas_used_ratio.len(), 10);
    assert_eq!(history.base_fee_per_gas.len(), 11);
    let rewards = history.reward.unwrap();
    assert_eq!(rewards.len(), 10);
    assert!(rewards.iter().all(|row| row.len() == percentiles.len()));
}

#[tokio::test]
async fn reports_each_block_in_ascending_order() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());

    // when
    let history = query(&resolver, 6, BlockTag::Latest.into(), &[0.0, 100.0])
        .await
        .unwrap();

    // then
    let blocks = (27..=HEAD).map(|height| chain.block(height)).collect::<Vec<_>>();

    let mut expected_base_fees = blocks.iter().map(|b| b.base_fee).collect::<Vec<_>>();
    expected_base_fees.push(blocks.last().unwrap().next_base_fee);
    assert_eq!(history.base_fee_per_gas, expected_base_fees);

    let expected_ratios = blocks
        .iter()
        .map(|b| b.gas_used as f64 / b.gas_limit as f64)
        .collect::<Vec<_>>();
    assert_eq!(history.gas_used_ratio, expected_ratios);

    let expected_rewards = blocks
        .iter()
        .map(|b| {
            let prices = b.transactions.iter().map(|tx| tx.effective_gas_price);
            vec![prices.clone().min().unwrap(), prices.max().unwrap()]
        })
        .collect::<Vec<_>>();
    assert_eq!(history.reward, Some(expected_rewards));
}

#[tokio::test]
async fn repeated_queries_are_served_from_cache() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());
    let first = query(&resolver, 8, BlockTag::Latest.into(), &[10.0, 90.0])
        .await
        .unwrap();
    let requests_after_first = chain.block_requests();

    // when
    let second = query(&resolver, 8, BlockTag::Latest.into(), &[10.0, 90.0])
        .await
        .unwrap();

    // then
    assert_eq!(requests_after_first, 8);
    assert_eq!(chain.block_requests(), requests_after_first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn resolvers_sharing_a_cache_share_fetched_blocks() {
    // given
    let chain = TestChain::new(HEAD);
    let cache = BlockStatsCache::new(NonZeroUsize::new(64).unwrap());
    let first = FeeHistoryResolver::new(chain.clone(), FeeHistoryConfig::default(), cache.clone());
    let second = FeeHistoryResolver::new(chain.clone(), FeeHistoryConfig::default(), cache);
    query(&first, 4, BlockTag::Latest.into(), &[]).await.unwrap();

    // when
    query(&second, 4, BlockTag::Latest.into(), &[])
        .await
        .unwrap();

    // then
    assert_eq!(chain.block_requests(), 4);
}

#[tokio::test]
async fn reorged_blocks_are_never_served_stale() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());
    let before = query(&resolver, 5, BlockTag::Latest.into(), &[])
        .await
        .unwrap();

    // when
    chain.reorg(30, HEAD);
    let after = query(&resolver, 5, BlockTag::Latest.into(), &[])
        .await
        .unwrap();

    // then
    assert_eq!(&after.base_fee_per_gas[..2], &before.base_fee_per_gas[..2]);
    assert_eq!(after.base_fee_per_gas[2], chain.block(30).base_fee);
    assert_ne!(after.base_fee_per_gas[2], before.base_fee_per_gas[2]);
    assert_eq!(chain.block_requests(), 5 + 3);
}

#[tokio::test]
async fn shortened_chain_turns_the_old_head_into_beyond_head() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());

    // when
    chain.reorg(20, 25);
    let result = query(&resolver, 3, HEAD.into(), &[]).await;

    // then
    assert_eq!(
        result,
        Err(Error::RequestBeyondHead {
            requested: HEAD,
            head: 25
        })
    );
}

#[tokio::test]
async fn backend_failure_fails_the_whole_query() {
    // given
    let chain = TestChain::new(HEAD);
    chain.fail_block(30);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());

    // when
    let result = query(&resolver, 5, BlockTag::Latest.into(), &[]).await;

    // then
    assert!(matches!(result, Err(Error::Retrieval(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_agree() {
    // given
    let chain = TestChain::new(HEAD);
    let resolver = given_resolver(&chain, FeeHistoryConfig::default());
    let reference = given_resolver(&chain, FeeHistoryConfig::default());
    let expected = query(&reference, 16, BlockTag::Latest.into(), &[50.0])
        .await
        .unwrap();

    // when
    let tasks = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                resolver
                    .fee_history(&CancellationToken::new(), 16, BlockTag::Latest.into(), &[50.0])
                    .await
            })
        })
        .collect::<Vec<_>>();

    // then
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), expected);
    }
}
