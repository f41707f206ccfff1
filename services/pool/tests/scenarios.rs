//! End-to-end pool scenarios through the serialised service

use dex_pool::{
    Asset, AssetLedger, Exchange, InMemoryAssetLedger, PoolError, PoolHandle, PoolService,
    ServiceOptions, SwapDirection, TransactionSequencer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use types::{AccountId, WeiAmount};

const POOL: AccountId = AccountId::new([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0d, 0x3c, 0x5a,
]);

fn deployer() -> AccountId {
    AccountId::from_low_u64(0xdead)
}

fn trader() -> AccountId {
    AccountId::from_low_u64(0xbeef)
}

type Service = (
    PoolHandle,
    JoinHandle<Exchange<Arc<InMemoryAssetLedger>>>,
    Arc<InMemoryAssetLedger>,
);

/// Pool seeded with 5 native / 5 token by the deployer, trader funded with 10 of each
async fn seeded_pool() -> Service {
    let assets = Arc::new(InMemoryAssetLedger::new());
    for account in [deployer(), trader()] {
        assets
            .mint(Asset::Native, account, WeiAmount::from_ether(10))
            .unwrap();
        assets
            .mint(Asset::Token, account, WeiAmount::from_ether(10))
            .unwrap();
    }
    assets
        .approve(deployer(), POOL, WeiAmount::from_ether(5))
        .await
        .unwrap();

    let exchange = Exchange::new(assets.clone(), POOL, 30).unwrap();
    let (handle, task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(deployer(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
        .await
        .unwrap();
    (handle, task, assets)
}

#[tokio::test]
async fn swap_one_eth_into_balanced_pool() {
    let (handle, _task, assets) = seeded_pool().await;
    let k_before = handle.snapshot().ledger.invariant();

    let receipt = handle
        .swap(trader(), SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap();

    // 1 * 0.997 * 5 / (5 + 0.997)
    assert_eq!(receipt.amount_out.raw_value(), 831_248_957_812_239_453);
    assert_eq!(receipt.reserves.eth_reserve, WeiAmount::from_ether(6));
    assert_eq!(
        receipt.reserves.token_reserve.raw_value(),
        4_168_751_042_187_760_547
    );
    assert!(handle.snapshot().ledger.invariant() > k_before);

    assert_eq!(
        assets.balance_of(Asset::Native, trader()).await.unwrap(),
        WeiAmount::from_ether(9)
    );
    assert_eq!(
        assets.balance_of(Asset::Token, POOL).await.unwrap(),
        receipt.reserves.token_reserve
    );
}

#[tokio::test]
async fn deposit_after_swap_charges_ceiling_token_amount() {
    let (handle, _task, assets) = seeded_pool().await;
    handle
        .swap(trader(), SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap();

    let sequencer = TransactionSequencer::new(assets.clone(), POOL, Duration::from_secs(5));
    let receipt = sequencer
        .deposit(&handle, trader(), WeiAmount::ONE)
        .await
        .unwrap();

    assert_eq!(receipt.token_amount.raw_value(), 694_791_840_364_626_758);
    assert_eq!(receipt.shares_minted.raw_value(), 833_333_333_333_333_333);
    assert_eq!(handle.position(&trader()), receipt.shares_minted);
    // The exact approval is fully consumed
    assert_eq!(
        assets.allowance(trader(), POOL).await.unwrap(),
        WeiAmount::ZERO
    );
}

#[tokio::test]
async fn withdrawing_all_shares_returns_untouched_reserves() {
    let (handle, task, assets) = seeded_pool().await;

    let receipt = handle
        .withdraw(deployer(), WeiAmount::from_ether(5))
        .await
        .unwrap();

    assert_eq!(receipt.eth_amount, WeiAmount::from_ether(5));
    assert_eq!(receipt.token_amount, WeiAmount::from_ether(5));
    assert_eq!(handle.total_liquidity(), WeiAmount::ZERO);
    assert!(handle.reserves().is_empty());
    assert_eq!(
        assets.balance_of(Asset::Token, deployer()).await.unwrap(),
        WeiAmount::from_ether(10)
    );

    // Empty again, so it can be re-seeded
    assets
        .approve(deployer(), POOL, WeiAmount::from_ether(2))
        .await
        .unwrap();
    handle
        .initialize_pool(deployer(), WeiAmount::ONE, WeiAmount::from_ether(2))
        .await
        .unwrap();
    handle.shutdown().await.unwrap();
    let exchange = task.await.unwrap();
    assert_eq!(exchange.total_liquidity(), WeiAmount::ONE);
}

#[tokio::test]
async fn token_swap_needs_approval_first() {
    let (handle, _task, assets) = seeded_pool().await;
    let reserves_before = handle.reserves();

    let err = handle
        .swap(trader(), SwapDirection::TokenToEth, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PoolError::AllowanceInsufficient {
            required: WeiAmount::ONE,
            available: WeiAmount::ZERO,
        }
    );
    assert!(err.needs_approval());
    assert_eq!(handle.reserves(), reserves_before);
    assert_eq!(
        assets.balance_of(Asset::Token, trader()).await.unwrap(),
        WeiAmount::from_ether(10)
    );

    assets
        .approve(trader(), POOL, WeiAmount::ONE)
        .await
        .unwrap();
    let receipt = handle
        .swap(trader(), SwapDirection::TokenToEth, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap();
    assert!(!receipt.amount_out.is_zero());
    assert_eq!(
        handle.reserves().token_reserve,
        WeiAmount::from_ether(6)
    );
}

#[tokio::test]
async fn sequencer_runs_both_phases_for_token_swaps() {
    let (handle, _task, assets) = seeded_pool().await;
    let sequencer = TransactionSequencer::new(assets.clone(), POOL, Duration::from_secs(5));

    let receipt = sequencer
        .swap(
            &handle,
            trader(),
            SwapDirection::TokenToEth,
            WeiAmount::ONE,
            WeiAmount::ZERO,
        )
        .await
        .unwrap();

    assert_eq!(receipt.direction, SwapDirection::TokenToEth);
    assert_eq!(
        assets.balance_of(Asset::Token, trader()).await.unwrap(),
        WeiAmount::from_ether(9)
    );
}

#[tokio::test]
async fn slippage_guard_rejects_without_mutation() {
    let (handle, _task, assets) = seeded_pool().await;
    let quote = handle
        .quote_swap(SwapDirection::EthToToken, WeiAmount::ONE)
        .unwrap();
    let before = handle.snapshot();
    let min = WeiAmount::from_wei(quote.amount_out.raw_value() + 1);

    let err = handle
        .swap(trader(), SwapDirection::EthToToken, WeiAmount::ONE, min)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(
        err,
        PoolError::SlippageExceeded {
            min,
            actual: quote.amount_out,
        }
    );
    assert_eq!(handle.snapshot(), before);
    assert_eq!(
        assets.balance_of(Asset::Native, trader()).await.unwrap(),
        WeiAmount::from_ether(10)
    );
}

#[tokio::test]
async fn error_kinds_for_invalid_requests() {
    let (handle, _task, _assets) = seeded_pool().await;

    assert_eq!(
        handle
            .initialize_pool(deployer(), WeiAmount::ONE, WeiAmount::ONE)
            .await
            .unwrap_err(),
        PoolError::AlreadyInitialized
    );
    assert_eq!(
        handle
            .swap(trader(), SwapDirection::EthToToken, WeiAmount::ZERO, WeiAmount::ZERO)
            .await
            .unwrap_err(),
        PoolError::ZeroAmount
    );
    assert!(matches!(
        handle.withdraw(trader(), WeiAmount::ONE).await.unwrap_err(),
        PoolError::InsufficientShares { .. }
    ));
    assert!(matches!(
        handle
            .swap(
                trader(),
                SwapDirection::EthToToken,
                WeiAmount::from_wei(1),
                WeiAmount::ZERO
            )
            .await
            .unwrap_err(),
        PoolError::InsufficientLiquidity(_)
    ));
}
