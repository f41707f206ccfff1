//! Serialised access, deadlines and conservation under concurrent callers

use dex_pool::{
    Asset, AssetLedger, Exchange, InMemoryAssetLedger, PoolError, PoolService, ServiceOptions,
    SwapDirection, TransactionSequencer,
};
use std::sync::Arc;
use std::time::Duration;
use types::{AccountId, WeiAmount};

fn pool() -> AccountId {
    AccountId::from_low_u64(0xd3c5)
}

fn seeder() -> AccountId {
    AccountId::from_low_u64(1)
}

fn traders() -> Vec<AccountId> {
    (100..116).map(AccountId::from_low_u64).collect()
}

async fn funded_assets(delay: Duration) -> Arc<InMemoryAssetLedger> {
    let assets = Arc::new(InMemoryAssetLedger::new().with_confirmation_delay(delay));
    for account in std::iter::once(seeder()).chain(traders()) {
        assets
            .mint(Asset::Native, account, WeiAmount::from_ether(20))
            .unwrap();
        assets
            .mint(Asset::Token, account, WeiAmount::from_ether(20))
            .unwrap();
        assets
            .approve(account, pool(), WeiAmount::from_ether(20))
            .await
            .unwrap();
    }
    assets
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_swaps_keep_invariant_and_conserve_assets() {
    let assets = funded_assets(Duration::ZERO).await;
    let native_supply = assets.total_supply(Asset::Native).unwrap();
    let token_supply = assets.total_supply(Asset::Token).unwrap();

    let exchange = Exchange::new(assets.clone(), pool(), 30).unwrap();
    let (handle, task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(seeder(), WeiAmount::from_ether(10), WeiAmount::from_ether(10))
        .await
        .unwrap();
    let k_initial = handle.snapshot().ledger.invariant();

    let mut workers = Vec::new();
    for (i, trader) in traders().into_iter().enumerate() {
        let handle = handle.clone();
        workers.push(tokio::spawn(async move {
            let mut outcomes = Vec::new();
            for round in 0..10u64 {
                let direction = if (i as u64 + round) % 2 == 0 {
                    SwapDirection::EthToToken
                } else {
                    SwapDirection::TokenToEth
                };
                let amount = WeiAmount::from_wei(WeiAmount::SCALE / 10 * (1 + round as u128 % 3));
                outcomes.push(handle.swap(trader, direction, amount, WeiAmount::ZERO).await);
            }
            outcomes
        }));
    }

    let mut executed = 0;
    for worker in workers {
        for outcome in worker.await.unwrap() {
            let receipt = outcome.unwrap();
            assert!(!receipt.amount_out.is_zero());
            executed += 1;
        }
    }
    assert_eq!(executed, 160);

    handle.shutdown().await.unwrap();
    let exchange = task.await.unwrap();
    let reserves = exchange.reserves();

    assert!(exchange.ledger().invariant() > k_initial);
    assert_eq!(exchange.ledger().sequence(), 161);
    assert_eq!(assets.total_supply(Asset::Native).unwrap(), native_supply);
    assert_eq!(assets.total_supply(Asset::Token).unwrap(), token_supply);
    assert_eq!(
        assets.balance_of(Asset::Native, pool()).await.unwrap(),
        reserves.eth_reserve
    );
    assert_eq!(
        assets.balance_of(Asset::Token, pool()).await.unwrap(),
        reserves.token_reserve
    );
}

#[tokio::test(start_paused = true)]
async fn slow_approval_times_out_without_touching_the_pool() {
    let assets = funded_assets(Duration::ZERO).await;
    let exchange = Exchange::new(assets.clone(), pool(), 30).unwrap();
    let (handle, _task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(seeder(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
        .await
        .unwrap();

    // A fresh account with no allowance, on a ledger that confirms slowly
    let latecomer = AccountId::from_low_u64(999);
    let slow = Arc::new(
        InMemoryAssetLedger::from_state(assets.snapshot())
            .with_confirmation_delay(Duration::from_secs(60)),
    );
    let sequencer = TransactionSequencer::new(slow.clone(), pool(), Duration::from_secs(1));
    let before = handle.snapshot();

    let err = sequencer
        .swap(
            &handle,
            latecomer,
            SwapDirection::TokenToEth,
            WeiAmount::ONE,
            WeiAmount::ZERO,
        )
        .await
        .unwrap_err();

    assert_eq!(err, PoolError::Timeout(Duration::from_secs(1)));
    assert!(err.is_retryable());
    assert_eq!(handle.snapshot(), before);
    assert_eq!(
        slow.allowance(latecomer, pool()).await.unwrap(),
        WeiAmount::ZERO
    );
}

#[tokio::test(start_paused = true)]
async fn commands_expiring_in_the_mailbox_are_dropped() {
    let assets = funded_assets(Duration::ZERO).await;
    let slow = Arc::new(
        InMemoryAssetLedger::from_state(assets.snapshot())
            .with_confirmation_delay(Duration::from_millis(200)),
    );
    let exchange = Exchange::new(slow, pool(), 30).unwrap();
    let (handle, task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(seeder(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
        .await
        .unwrap();

    let [first, second] = [traders()[0], traders()[1]];
    let busy = {
        let handle = handle.clone();
        tokio::spawn(async move {
            handle
                .swap(first, SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let impatient = handle.clone().with_timeout(Duration::from_millis(50));
    let err = impatient
        .swap(second, SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err, PoolError::Timeout(Duration::from_millis(50)));

    busy.await.unwrap().unwrap();
    handle.shutdown().await.unwrap();
    let exchange = task.await.unwrap();

    // initialize + the first swap only
    assert_eq!(exchange.ledger().sequence(), 2);
    assert_eq!(
        exchange
            .assets()
            .balance_of(Asset::Native, second)
            .await
            .unwrap(),
        WeiAmount::from_ether(20)
    );
}

#[tokio::test(start_paused = true)]
async fn started_commands_report_their_real_outcome_past_the_deadline() {
    let assets = funded_assets(Duration::ZERO).await;
    let slow = Arc::new(
        InMemoryAssetLedger::from_state(assets.snapshot())
            .with_confirmation_delay(Duration::from_millis(200)),
    );
    let exchange = Exchange::new(slow, pool(), 30).unwrap();
    let (handle, task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(seeder(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
        .await
        .unwrap();

    // Pull and payout take 400ms together, longer than the handle's deadline
    let hurried = handle.clone().with_timeout(Duration::from_millis(300));
    let receipt = hurried
        .swap(traders()[0], SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
        .await
        .unwrap();
    assert_eq!(receipt.amount_out, WeiAmount::from_wei(831_248_957_812_239_453));
    assert_eq!(handle.snapshot().ledger.sequence(), 2);

    handle.shutdown().await.unwrap();
    let exchange = task.await.unwrap();
    assert_eq!(exchange.ledger().sequence(), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_means_the_command_never_ran() {
    let assets = funded_assets(Duration::ZERO).await;
    let slow = Arc::new(
        InMemoryAssetLedger::from_state(assets.snapshot())
            .with_confirmation_delay(Duration::from_millis(200)),
    );
    let exchange = Exchange::new(slow, pool(), 30).unwrap();
    let (handle, task) = PoolService::spawn(exchange, ServiceOptions::default(), None);
    handle
        .initialize_pool(seeder(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
        .await
        .unwrap();

    let mut callers = Vec::new();
    for (i, trader) in traders().into_iter().take(4).enumerate() {
        let handle = handle
            .clone()
            .with_timeout(Duration::from_millis(300 * (i as u64 + 1)));
        callers.push(tokio::spawn(async move {
            handle
                .swap(trader, SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
                .await
        }));
    }

    let mut committed = 0u64;
    for caller in callers {
        match caller.await.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => assert!(matches!(err, PoolError::Timeout(_))),
        }
    }

    handle.shutdown().await.unwrap();
    let exchange = task.await.unwrap();
    // Every success is committed, and nothing else is
    assert_eq!(exchange.ledger().sequence(), 1 + committed);
}
