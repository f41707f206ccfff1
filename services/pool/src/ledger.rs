//! Reserve Ledger
//!
//! Sole owner of the reserve pair, the liquidity supply and the position
//! table. Every mutation computes all new values with checked arithmetic
//! first and assigns them only once every step succeeded, so a failed call
//! leaves the ledger exactly as it was.

use crate::error::{PoolError, Result};
use amm::{LiquidityMath, ReservePair, SwapDirection, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use types::{AccountId, WeiAmount};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveLedger {
    reserves: ReservePair,
    total_liquidity: WeiAmount,
    positions: BTreeMap<AccountId, WeiAmount>,
    /// Count of committed mutations, carried into snapshots
    sequence: u64,
}

impl ReserveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted parts, rejecting inconsistent state
    pub fn from_parts(
        reserves: ReservePair,
        total_liquidity: WeiAmount,
        positions: BTreeMap<AccountId, WeiAmount>,
        sequence: u64,
    ) -> Result<Self> {
        let ledger = Self {
            reserves,
            total_liquidity,
            positions,
            sequence,
        };
        ledger.check_consistency()?;
        Ok(ledger)
    }

    pub fn is_initialized(&self) -> bool {
        !self.total_liquidity.is_zero()
    }

    pub fn reserves(&self) -> ReservePair {
        self.reserves
    }

    pub fn total_liquidity(&self) -> WeiAmount {
        self.total_liquidity
    }

    /// Shares held by `owner`; zero when it has no position
    pub fn position(&self, owner: &AccountId) -> WeiAmount {
        self.positions.get(owner).copied().unwrap_or_default()
    }

    pub fn positions(&self) -> &BTreeMap<AccountId, WeiAmount> {
        &self.positions
    }

    pub fn invariant(&self) -> U256 {
        self.reserves.invariant()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current reserves, or `NotInitialized` for an empty pool
    pub fn require_initialized(&self) -> Result<ReservePair> {
        if !self.is_initialized() {
            return Err(PoolError::NotInitialized);
        }
        Ok(self.reserves)
    }

    /// Seed an empty pool; the provider receives one share per native unit
    pub fn initialize(
        &mut self,
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
    ) -> Result<WeiAmount> {
        if self.is_initialized() || !self.reserves.is_empty() {
            return Err(PoolError::AlreadyInitialized);
        }
        let shares = LiquidityMath::genesis_shares(eth_amount, token_amount)?;

        self.reserves = ReservePair::new(eth_amount, token_amount);
        self.total_liquidity = shares;
        self.positions.clear();
        self.positions.insert(provider, shares);
        self.sequence += 1;

        debug!(%provider, %eth_amount, %token_amount, %shares, "Pool initialized");
        Ok(shares)
    }

    /// Credit `amount_in` to the input reserve and debit `amount_out` from the other
    pub fn apply_swap(
        &mut self,
        direction: SwapDirection,
        amount_in: WeiAmount,
        amount_out: WeiAmount,
    ) -> Result<ReservePair> {
        let before = self.require_initialized()?;
        let (_, reserve_out) = before.ordered(direction);
        if amount_out >= reserve_out {
            return Err(PoolError::InsufficientLiquidity("output would drain reserve"));
        }

        let after = before.after_swap(direction, amount_in, amount_out)?;
        if after.invariant() < before.invariant() {
            return Err(PoolError::InsufficientLiquidity("swap would decrease invariant"));
        }

        self.reserves = after;
        self.sequence += 1;
        Ok(after)
    }

    pub fn apply_deposit(
        &mut self,
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
        shares: WeiAmount,
    ) -> Result<()> {
        let before = self.require_initialized()?;
        if eth_amount.is_zero() || shares.is_zero() {
            return Err(PoolError::ZeroAmount);
        }

        let reserves = ReservePair::new(
            before.eth_reserve.checked_add(eth_amount)?,
            before.token_reserve.checked_add(token_amount)?,
        );
        let total_liquidity = self.total_liquidity.checked_add(shares)?;
        let held = self.position(&provider).checked_add(shares)?;

        self.reserves = reserves;
        self.total_liquidity = total_liquidity;
        self.positions.insert(provider, held);
        self.sequence += 1;
        Ok(())
    }

    /// Burn shares and release the reserves they claim
    ///
    /// Burning the whole supply returns the pool to the uninitialized state.
    pub fn apply_withdraw(
        &mut self,
        provider: AccountId,
        shares: WeiAmount,
        eth_out: WeiAmount,
        token_out: WeiAmount,
    ) -> Result<()> {
        let before = self.require_initialized()?;
        if shares.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let held = self.position(&provider);
        if held < shares {
            return Err(PoolError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        let remaining_held = held.checked_sub(shares)?;
        let total_liquidity = self.total_liquidity.checked_sub(shares)?;
        let reserves = ReservePair::new(
            before.eth_reserve.checked_sub(eth_out)?,
            before.token_reserve.checked_sub(token_out)?,
        );
        if total_liquidity.is_zero() && !reserves.is_empty() {
            return Err(PoolError::InsufficientLiquidity(
                "final withdrawal must release both reserves",
            ));
        }
        if !total_liquidity.is_zero()
            && (reserves.eth_reserve.is_zero() || reserves.token_reserve.is_zero())
        {
            return Err(PoolError::InsufficientLiquidity("withdrawal would drain reserve"));
        }

        self.reserves = reserves;
        self.total_liquidity = total_liquidity;
        if remaining_held.is_zero() {
            self.positions.remove(&provider);
        } else {
            self.positions.insert(provider, remaining_held);
        }
        self.sequence += 1;

        if total_liquidity.is_zero() {
            debug!(%provider, "Last shares withdrawn, pool is empty");
        }
        Ok(())
    }

    /// Positions sum to the supply; reserves are both positive or both zero
    pub fn check_consistency(&self) -> Result<()> {
        let mut sum = WeiAmount::ZERO;
        for shares in self.positions.values() {
            if shares.is_zero() {
                return Err(PoolError::Persistence("zero-share position".into()));
            }
            sum = sum.checked_add(*shares)?;
        }
        if sum != self.total_liquidity {
            return Err(PoolError::Persistence(format!(
                "positions sum to {} but supply is {}",
                sum, self.total_liquidity
            )));
        }

        let reserves = self.reserves;
        let consistent = if self.total_liquidity.is_zero() {
            reserves.is_empty()
        } else {
            !reserves.eth_reserve.is_zero() && !reserves.token_reserve.is_zero()
        };
        if !consistent {
            return Err(PoolError::Persistence(format!(
                "reserves ({}, {}) do not match supply {}",
                reserves.eth_reserve, reserves.token_reserve, self.total_liquidity
            )));
        }
        Ok(())
    }
}
