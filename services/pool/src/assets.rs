//! External asset ledger capability
//!
//! The pool does not own balances. It consumes `balance_of`, `allowance`,
//! `approve`, `transfer` and `transfer_from` from an external fungible-asset
//! ledger. [`InMemoryAssetLedger`] is a local development ledger used by the
//! CLI and tests.

use crate::error::{PoolError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{AccountId, WeiAmount};

/// The two pool assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Native asset, sent as value with the call; needs no allowance
    Native,
    /// Fungible token; the pool may only pull it within an allowance
    Token,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token => write!(f, "token"),
        }
    }
}

/// Capabilities of the external asset ledger
///
/// `approve` resolves only once the approval is confirmed.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn balance_of(&self, asset: Asset, account: AccountId) -> Result<WeiAmount>;

    async fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<WeiAmount>;

    async fn approve(&self, owner: AccountId, spender: AccountId, amount: WeiAmount)
        -> Result<()>;

    /// Move `amount` of `asset` from `from` (acting on its own behalf)
    async fn transfer(
        &self,
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()>;

    /// Pull tokens from `owner` to `to`, consuming `spender`'s allowance
    async fn transfer_from(
        &self,
        spender: AccountId,
        owner: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()>;
}

#[async_trait]
impl<T: AssetLedger + ?Sized> AssetLedger for Arc<T> {
    async fn balance_of(&self, asset: Asset, account: AccountId) -> Result<WeiAmount> {
        (**self).balance_of(asset, account).await
    }

    async fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<WeiAmount> {
        (**self).allowance(owner, spender).await
    }

    async fn approve(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        (**self).approve(owner, spender, amount).await
    }

    async fn transfer(
        &self,
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        (**self).transfer(asset, from, to, amount).await
    }

    async fn transfer_from(
        &self,
        spender: AccountId,
        owner: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        (**self).transfer_from(spender, owner, to, amount).await
    }
}

/// Serialisable balances and allowances of the development ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub native: BTreeMap<AccountId, WeiAmount>,
    pub token: BTreeMap<AccountId, WeiAmount>,
    /// (owner, spender) -> remaining allowance
    pub allowances: BTreeMap<(AccountId, AccountId), WeiAmount>,
}

impl LedgerState {
    fn balances(&self, asset: Asset) -> &BTreeMap<AccountId, WeiAmount> {
        match asset {
            Asset::Native => &self.native,
            Asset::Token => &self.token,
        }
    }

    fn balances_mut(&mut self, asset: Asset) -> &mut BTreeMap<AccountId, WeiAmount> {
        match asset {
            Asset::Native => &mut self.native,
            Asset::Token => &mut self.token,
        }
    }

    fn balance(&self, asset: Asset, account: &AccountId) -> WeiAmount {
        self.balances(asset).get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: AccountId, spender: AccountId) -> WeiAmount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Validate then apply; nothing changes on error
    fn move_balance(
        &mut self,
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        let available = self.balance(asset, &from);
        if available < amount {
            return Err(PoolError::InsufficientBalance {
                asset,
                required: amount,
                available,
            });
        }
        let debited = available.checked_sub(amount)?;
        let credited = if from == to {
            available
        } else {
            self.balance(asset, &to).checked_add(amount)?
        };

        let balances = self.balances_mut(asset);
        balances.insert(from, debited);
        balances.insert(to, credited);
        Ok(())
    }
}

/// In-process ledger standing in for an external chain
///
/// An optional confirmation delay is applied to every state-changing call,
/// which lets tests exercise timeouts.
#[derive(Debug, Default)]
pub struct InMemoryAssetLedger {
    state: Mutex<LedgerState>,
    confirmation_delay: Duration,
}

impl InMemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: Mutex::new(state),
            confirmation_delay: Duration::ZERO,
        }
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// Faucet: credit `amount` of `asset` to `account`
    pub fn mint(&self, asset: Asset, account: AccountId, amount: WeiAmount) -> Result<()> {
        let mut state = self.state.lock();
        let balance = state.balance(asset, &account).checked_add(amount)?;
        state.balances_mut(asset).insert(account, balance);
        debug!(%account, %asset, %amount, "Minted development funds");
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().clone()
    }

    /// Sum of all balances of `asset` across accounts
    pub fn total_supply(&self, asset: Asset) -> Result<WeiAmount> {
        let total = self
            .state
            .lock()
            .balances(asset)
            .values()
            .try_fold(WeiAmount::ZERO, |acc, balance| acc.checked_add(*balance))?;
        Ok(total)
    }

    async fn confirm(&self) {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }
    }
}

#[async_trait]
impl AssetLedger for InMemoryAssetLedger {
    async fn balance_of(&self, asset: Asset, account: AccountId) -> Result<WeiAmount> {
        Ok(self.state.lock().balance(asset, &account))
    }

    async fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<WeiAmount> {
        Ok(self.state.lock().allowance(owner, spender))
    }

    async fn approve(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        self.confirm().await;
        self.state.lock().allowances.insert((owner, spender), amount);
        debug!(%owner, %spender, %amount, "Approval confirmed");
        Ok(())
    }

    async fn transfer(
        &self,
        asset: Asset,
        from: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        self.confirm().await;
        self.state.lock().move_balance(asset, from, to, amount)
    }

    async fn transfer_from(
        &self,
        spender: AccountId,
        owner: AccountId,
        to: AccountId,
        amount: WeiAmount,
    ) -> Result<()> {
        self.confirm().await;
        let mut state = self.state.lock();

        let available = state.allowance(owner, spender);
        if available < amount {
            return Err(PoolError::AllowanceInsufficient {
                required: amount,
                available,
            });
        }
        let remaining = available.checked_sub(amount)?;

        state.move_balance(Asset::Token, owner, to, amount)?;
        state.allowances.insert((owner, spender), remaining);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::from_low_u64(1)
    }

    fn pool() -> AccountId {
        AccountId::from_low_u64(0xd3c5)
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let ledger = InMemoryAssetLedger::new();
        ledger.mint(Asset::Native, alice(), WeiAmount::from_ether(3)).unwrap();

        ledger
            .transfer(Asset::Native, alice(), pool(), WeiAmount::ONE)
            .await
            .unwrap();

        assert_eq!(
            ledger.balance_of(Asset::Native, alice()).await.unwrap(),
            WeiAmount::from_ether(2)
        );
        assert_eq!(
            ledger.balance_of(Asset::Native, pool()).await.unwrap(),
            WeiAmount::ONE
        );
    }

    #[tokio::test]
    async fn test_transfer_rejects_overdraft() {
        let ledger = InMemoryAssetLedger::new();
        let err = ledger
            .transfer(Asset::Token, alice(), pool(), WeiAmount::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::InsufficientBalance { asset: Asset::Token, .. }));
    }

    #[tokio::test]
    async fn test_transfer_from_consumes_allowance() {
        let ledger = InMemoryAssetLedger::new();
        ledger.mint(Asset::Token, alice(), WeiAmount::from_ether(10)).unwrap();

        let err = ledger
            .transfer_from(pool(), alice(), pool(), WeiAmount::ONE)
            .await
            .unwrap_err();
        assert!(err.needs_approval());

        ledger
            .approve(alice(), pool(), WeiAmount::from_ether(3))
            .await
            .unwrap();
        ledger
            .transfer_from(pool(), alice(), pool(), WeiAmount::from_ether(2))
            .await
            .unwrap();

        assert_eq!(
            ledger.allowance(alice(), pool()).await.unwrap(),
            WeiAmount::ONE
        );
        assert_eq!(
            ledger.balance_of(Asset::Token, alice()).await.unwrap(),
            WeiAmount::from_ether(8)
        );
    }

    #[test]
    fn test_snapshot_restores() {
        let ledger = InMemoryAssetLedger::new();
        ledger.mint(Asset::Token, alice(), WeiAmount::from_ether(4)).unwrap();

        let restored = InMemoryAssetLedger::from_state(ledger.snapshot());
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(
            restored.total_supply(Asset::Token).unwrap(),
            WeiAmount::from_ether(4)
        );
    }

    #[test]
    fn test_total_supply_reports_overflow() {
        let ledger = InMemoryAssetLedger::new();
        ledger.mint(Asset::Native, alice(), WeiAmount::MAX).unwrap();
        ledger.mint(Asset::Native, pool(), WeiAmount::ONE).unwrap();

        let err = ledger.total_supply(Asset::Native).unwrap_err();
        assert_eq!(err.kind(), "Overflow");
        assert_eq!(ledger.total_supply(Asset::Token).unwrap(), WeiAmount::ZERO);
    }
}
