//! Liquidity Manager
//!
//! Mints and burns proportional shares. The token leg of a deposit is
//! rounded up and every payout is rounded down, so neither operation can
//! move value away from existing holders.

use crate::error::{PoolError, Result};
use crate::ledger::ReserveLedger;
use amm::{DepositAmounts, LiquidityMath, WithdrawAmounts};
use serde::{Deserialize, Serialize};
use tracing::info;
use types::{AccountId, WeiAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub eth_amount: WeiAmount,
    pub token_amount: WeiAmount,
    pub shares_minted: WeiAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub shares_burned: WeiAmount,
    pub eth_amount: WeiAmount,
    pub token_amount: WeiAmount,
}

pub struct LiquidityManager;

impl LiquidityManager {
    /// Seed the pool; returns the genesis shares minted to `provider`
    pub fn initialize(
        ledger: &mut ReserveLedger,
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
    ) -> Result<WeiAmount> {
        let shares = ledger.initialize(provider, eth_amount, token_amount)?;
        info!(%provider, %eth_amount, %token_amount, %shares, "Liquidity initialized");
        Ok(shares)
    }

    /// Read-only deposit preview
    pub fn quote_deposit(ledger: &ReserveLedger, eth_amount: WeiAmount) -> Result<DepositAmounts> {
        if eth_amount.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let reserves = ledger.require_initialized()?;
        Ok(LiquidityMath::deposit_amounts(
            eth_amount,
            &reserves,
            ledger.total_liquidity(),
        )?)
    }

    /// Price a deposit and apply the optional `max_token_in` guard
    pub fn plan_deposit(
        ledger: &ReserveLedger,
        eth_amount: WeiAmount,
        max_token_in: Option<WeiAmount>,
    ) -> Result<DepositAmounts> {
        let amounts = Self::quote_deposit(ledger, eth_amount)?;
        if let Some(max) = max_token_in {
            if amounts.token_required > max {
                return Err(PoolError::MaxInputExceeded {
                    max,
                    required: amounts.token_required,
                });
            }
        }
        Ok(amounts)
    }

    pub fn commit_deposit(
        ledger: &mut ReserveLedger,
        provider: AccountId,
        amounts: &DepositAmounts,
    ) -> Result<DepositReceipt> {
        ledger.apply_deposit(
            provider,
            amounts.eth_amount,
            amounts.token_required,
            amounts.shares_minted,
        )?;
        info!(
            %provider,
            eth = %amounts.eth_amount,
            token = %amounts.token_required,
            shares = %amounts.shares_minted,
            "Liquidity deposited"
        );
        Ok(DepositReceipt {
            eth_amount: amounts.eth_amount,
            token_amount: amounts.token_required,
            shares_minted: amounts.shares_minted,
        })
    }

    pub fn deposit(
        ledger: &mut ReserveLedger,
        provider: AccountId,
        eth_amount: WeiAmount,
        max_token_in: Option<WeiAmount>,
    ) -> Result<DepositReceipt> {
        let amounts = Self::plan_deposit(ledger, eth_amount, max_token_in)?;
        Self::commit_deposit(ledger, provider, &amounts)
    }

    /// Price a withdrawal after checking the provider's holding
    pub fn plan_withdraw(
        ledger: &ReserveLedger,
        provider: AccountId,
        shares: WeiAmount,
    ) -> Result<WithdrawAmounts> {
        if shares.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let reserves = ledger.require_initialized()?;
        let held = ledger.position(&provider);
        if held < shares {
            return Err(PoolError::InsufficientShares {
                requested: shares,
                held,
            });
        }
        Ok(LiquidityMath::withdraw_amounts(
            shares,
            &reserves,
            ledger.total_liquidity(),
        )?)
    }

    pub fn commit_withdraw(
        ledger: &mut ReserveLedger,
        provider: AccountId,
        amounts: &WithdrawAmounts,
    ) -> Result<WithdrawReceipt> {
        ledger.apply_withdraw(
            provider,
            amounts.shares_burned,
            amounts.eth_out,
            amounts.token_out,
        )?;
        info!(
            %provider,
            shares = %amounts.shares_burned,
            eth = %amounts.eth_out,
            token = %amounts.token_out,
            "Liquidity withdrawn"
        );
        Ok(WithdrawReceipt {
            shares_burned: amounts.shares_burned,
            eth_amount: amounts.eth_out,
            token_amount: amounts.token_out,
        })
    }

    pub fn withdraw(
        ledger: &mut ReserveLedger,
        provider: AccountId,
        shares: WeiAmount,
    ) -> Result<WithdrawReceipt> {
        let amounts = Self::plan_withdraw(ledger, provider, shares)?;
        Self::commit_withdraw(ledger, provider, &amounts)
    }
}
