//! Exchange - the owned pool value
//!
//! Owns the Reserve Ledger, the fee policy, the pool account and the
//! external asset ledger. Every caller-facing operation follows the same
//! order: validate math, balances and allowance; pull the caller's inputs;
//! commit the ledger; push the payout. A failure after the pull refunds what
//! was taken and restores the ledger checkpoint, so no operation has a
//! partial effect.

use crate::assets::{Asset, AssetLedger};
use crate::error::{PoolError, Result};
use crate::executor::{TradeExecutor, TradeReceipt};
use crate::ledger::ReserveLedger;
use crate::liquidity::{DepositReceipt, LiquidityManager, WithdrawReceipt};
use amm::{DepositAmounts, LiquidityMath, ReservePair, SwapDirection, TradeQuote};
use tracing::{error, info, warn};
use types::{AccountId, WeiAmount};

/// One asset movement
type Leg = (Asset, WeiAmount);

pub struct Exchange<L> {
    ledger: ReserveLedger,
    executor: TradeExecutor,
    pool_account: AccountId,
    assets: L,
}

impl<L: AssetLedger> Exchange<L> {
    /// Empty pool holding its reserves under `pool_account`
    pub fn new(assets: L, pool_account: AccountId, fee_bps: u32) -> Result<Self> {
        Self::restore(ReserveLedger::new(), assets, pool_account, fee_bps)
    }

    /// Resume from a persisted ledger
    pub fn restore(
        ledger: ReserveLedger,
        assets: L,
        pool_account: AccountId,
        fee_bps: u32,
    ) -> Result<Self> {
        ledger.check_consistency()?;
        Ok(Self {
            ledger,
            executor: TradeExecutor::new(fee_bps)?,
            pool_account,
            assets,
        })
    }

    pub fn ledger(&self) -> &ReserveLedger {
        &self.ledger
    }

    pub fn assets(&self) -> &L {
        &self.assets
    }

    pub fn pool_account(&self) -> AccountId {
        self.pool_account
    }

    pub fn fee_bps(&self) -> u32 {
        self.executor.fee_bps()
    }

    pub fn reserves(&self) -> ReservePair {
        self.ledger.reserves()
    }

    pub fn total_liquidity(&self) -> WeiAmount {
        self.ledger.total_liquidity()
    }

    pub fn position(&self, owner: &AccountId) -> WeiAmount {
        self.ledger.position(owner)
    }

    pub fn quote_swap(&self, direction: SwapDirection, amount_in: WeiAmount) -> Result<TradeQuote> {
        self.executor.preview(&self.ledger, direction, amount_in)
    }

    pub fn quote_deposit(&self, eth_amount: WeiAmount) -> Result<DepositAmounts> {
        LiquidityManager::quote_deposit(&self.ledger, eth_amount)
    }

    /// Seed the pool from `provider`'s balances; returns the genesis shares
    ///
    /// The token leg needs an allowance for the pool account.
    pub async fn initialize_pool(
        &mut self,
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
    ) -> Result<WeiAmount> {
        if self.ledger.is_initialized() {
            return Err(PoolError::AlreadyInitialized);
        }
        LiquidityMath::genesis_shares(eth_amount, token_amount)?;

        let legs = [(Asset::Native, eth_amount), (Asset::Token, token_amount)];
        self.validate_inputs(provider, &legs).await?;
        self.pull(provider, &legs).await?;

        match LiquidityManager::initialize(&mut self.ledger, provider, eth_amount, token_amount) {
            Ok(shares) => Ok(shares),
            Err(err) => {
                self.refund(provider, &legs).await;
                Err(err)
            }
        }
    }

    /// Trade `amount_in` for at least `min_amount_out`
    pub async fn swap(
        &mut self,
        trader: AccountId,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
    ) -> Result<TradeReceipt> {
        let quote = self
            .executor
            .plan(&self.ledger, direction, amount_in, min_amount_out)?;
        let (asset_in, asset_out) = match direction {
            SwapDirection::EthToToken => (Asset::Native, Asset::Token),
            SwapDirection::TokenToEth => (Asset::Token, Asset::Native),
        };
        let input = [(asset_in, amount_in)];
        let output = [(asset_out, quote.amount_out)];

        self.validate_inputs(trader, &input).await?;
        self.pull(trader, &input).await?;

        let checkpoint = self.ledger.clone();
        let receipt = match self.executor.commit(&mut self.ledger, &quote) {
            Ok(receipt) => receipt,
            Err(err) => {
                self.refund(trader, &input).await;
                return Err(err);
            }
        };

        if let Err(err) = self.push(trader, &output).await {
            warn!(%trader, error = %err, "Swap payout failed, reverting");
            self.ledger = checkpoint;
            self.refund(trader, &input).await;
            return Err(err);
        }
        Ok(receipt)
    }

    /// Add liquidity at the current ratio
    ///
    /// `max_token_in` bounds the token leg; `None` accepts the quoted amount.
    pub async fn deposit(
        &mut self,
        provider: AccountId,
        eth_amount: WeiAmount,
        max_token_in: Option<WeiAmount>,
    ) -> Result<DepositReceipt> {
        let amounts = LiquidityManager::plan_deposit(&self.ledger, eth_amount, max_token_in)?;
        let legs = [
            (Asset::Native, amounts.eth_amount),
            (Asset::Token, amounts.token_required),
        ];

        self.validate_inputs(provider, &legs).await?;
        self.pull(provider, &legs).await?;

        match LiquidityManager::commit_deposit(&mut self.ledger, provider, &amounts) {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                self.refund(provider, &legs).await;
                Err(err)
            }
        }
    }

    /// Burn `shares` and pay out the proportional reserves
    pub async fn withdraw(
        &mut self,
        provider: AccountId,
        shares: WeiAmount,
    ) -> Result<WithdrawReceipt> {
        let amounts = LiquidityManager::plan_withdraw(&self.ledger, provider, shares)?;
        let payout = [
            (Asset::Native, amounts.eth_out),
            (Asset::Token, amounts.token_out),
        ];

        for (asset, amount) in payout {
            self.require_balance(asset, self.pool_account, amount).await?;
        }

        let checkpoint = self.ledger.clone();
        let receipt = LiquidityManager::commit_withdraw(&mut self.ledger, provider, &amounts)?;

        if let Err(err) = self.push(provider, &payout).await {
            warn!(%provider, error = %err, "Withdrawal payout failed, reverting");
            self.ledger = checkpoint;
            return Err(err);
        }
        Ok(receipt)
    }

    async fn require_balance(
        &self,
        asset: Asset,
        account: AccountId,
        required: WeiAmount,
    ) -> Result<()> {
        let available = self.assets.balance_of(asset, account).await?;
        if available < required {
            return Err(PoolError::InsufficientBalance {
                asset,
                required,
                available,
            });
        }
        Ok(())
    }

    /// Check `owner` can fund every leg; the token leg also needs an allowance
    async fn validate_inputs(&self, owner: AccountId, legs: &[Leg]) -> Result<()> {
        for &(asset, amount) in legs {
            if asset == Asset::Token {
                let available = self.assets.allowance(owner, self.pool_account).await?;
                if available < amount {
                    return Err(PoolError::AllowanceInsufficient {
                        required: amount,
                        available,
                    });
                }
            }
            self.require_balance(asset, owner, amount).await?;
        }
        Ok(())
    }

    async fn pull_leg(&self, from: AccountId, (asset, amount): Leg) -> Result<()> {
        match asset {
            Asset::Native => {
                self.assets
                    .transfer(Asset::Native, from, self.pool_account, amount)
                    .await
            }
            Asset::Token => {
                self.assets
                    .transfer_from(self.pool_account, from, self.pool_account, amount)
                    .await
            }
        }
    }

    /// Pull every leg from `from`, returning the ones already taken on failure
    async fn pull(&self, from: AccountId, legs: &[Leg]) -> Result<()> {
        for (done, &leg) in legs.iter().enumerate() {
            if leg.1.is_zero() {
                continue;
            }
            if let Err(err) = self.pull_leg(from, leg).await {
                self.refund(from, &legs[..done]).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Pay every leg to `to`, reclaiming the ones already paid on failure
    async fn push(&self, to: AccountId, legs: &[Leg]) -> Result<()> {
        for (done, &(asset, amount)) in legs.iter().enumerate() {
            if amount.is_zero() {
                continue;
            }
            if let Err(err) = self.assets.transfer(asset, self.pool_account, to, amount).await {
                for &(paid_asset, paid) in &legs[..done] {
                    if paid.is_zero() {
                        continue;
                    }
                    if let Err(reclaim) = self
                        .assets
                        .transfer(paid_asset, to, self.pool_account, paid)
                        .await
                    {
                        error!(%to, asset = %paid_asset, amount = %paid, error = %reclaim, "Failed to reclaim payout");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Best-effort return of pulled inputs
    async fn refund(&self, to: AccountId, legs: &[Leg]) {
        for &(asset, amount) in legs {
            if amount.is_zero() {
                continue;
            }
            match self.assets.transfer(asset, self.pool_account, to, amount).await {
                Ok(()) => info!(%to, %asset, %amount, "Refunded input"),
                Err(err) => error!(%to, %asset, %amount, error = %err, "Refund failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::InMemoryAssetLedger;
    use std::sync::Arc;

    fn pool() -> AccountId {
        AccountId::from_low_u64(0xd3c5)
    }

    fn alice() -> AccountId {
        AccountId::from_low_u64(1)
    }

    fn funded_ledger() -> Arc<InMemoryAssetLedger> {
        let assets = Arc::new(InMemoryAssetLedger::new());
        assets
            .mint(Asset::Native, alice(), WeiAmount::from_ether(100))
            .unwrap();
        assets
            .mint(Asset::Token, alice(), WeiAmount::from_ether(100))
            .unwrap();
        assets
    }

    async fn seeded() -> (Exchange<Arc<InMemoryAssetLedger>>, Arc<InMemoryAssetLedger>) {
        let assets = funded_ledger();
        assets
            .approve(alice(), pool(), WeiAmount::from_ether(5))
            .await
            .unwrap();
        let mut exchange = Exchange::new(assets.clone(), pool(), 30).unwrap();
        exchange
            .initialize_pool(alice(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
            .await
            .unwrap();
        (exchange, assets)
    }

    #[tokio::test]
    async fn test_initialize_moves_reserves_to_pool() {
        let (exchange, assets) = seeded().await;

        assert_eq!(
            assets.balance_of(Asset::Native, pool()).await.unwrap(),
            WeiAmount::from_ether(5)
        );
        assert_eq!(
            assets.balance_of(Asset::Token, pool()).await.unwrap(),
            WeiAmount::from_ether(5)
        );
        assert_eq!(exchange.position(&alice()), WeiAmount::from_ether(5));
    }

    #[tokio::test]
    async fn test_initialize_without_allowance_takes_nothing() {
        let assets = funded_ledger();
        let mut exchange = Exchange::new(assets.clone(), pool(), 30).unwrap();

        let err = exchange
            .initialize_pool(alice(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
            .await
            .unwrap_err();

        assert!(err.needs_approval());
        assert_eq!(
            assets.balance_of(Asset::Native, alice()).await.unwrap(),
            WeiAmount::from_ether(100)
        );
        assert!(!exchange.ledger().is_initialized());
    }

    #[tokio::test]
    async fn test_swap_pays_trader() {
        let (mut exchange, assets) = seeded().await;

        let receipt = exchange
            .swap(alice(), SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
            .await
            .unwrap();

        assert_eq!(
            assets.balance_of(Asset::Token, alice()).await.unwrap().raw_value(),
            95 * WeiAmount::SCALE + receipt.amount_out.raw_value()
        );
        assert_eq!(
            assets.balance_of(Asset::Token, pool()).await.unwrap(),
            exchange.reserves().token_reserve
        );
    }

    #[tokio::test]
    async fn test_swap_with_insufficient_balance_is_rejected() {
        let (mut exchange, _) = seeded().await;
        let broke = AccountId::from_low_u64(42);
        let before = exchange.reserves();

        let err = exchange
            .swap(broke, SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::InsufficientBalance { asset: Asset::Native, .. }));
        assert_eq!(exchange.reserves(), before);
    }

    #[tokio::test]
    async fn test_withdraw_pays_out_reserves() {
        let (mut exchange, assets) = seeded().await;

        let receipt = exchange
            .withdraw(alice(), WeiAmount::from_ether(5))
            .await
            .unwrap();

        assert_eq!(receipt.eth_amount, WeiAmount::from_ether(5));
        assert_eq!(
            assets.balance_of(Asset::Native, alice()).await.unwrap(),
            WeiAmount::from_ether(100)
        );
        assert_eq!(
            assets.balance_of(Asset::Token, pool()).await.unwrap(),
            WeiAmount::ZERO
        );
        assert!(!exchange.ledger().is_initialized());
    }
}
