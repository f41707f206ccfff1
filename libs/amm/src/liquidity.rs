//! Proportional liquidity share math
//!
//! Shares are minted against the native-asset reserve. Genesis mints one
//! share per native unit deposited; later deposits mint in proportion to the
//! existing supply, and the token leg is charged rounded up so a depositor
//! can never dilute existing holders.

use crate::error::{AmmError, Result};
use crate::pool_traits::ReservePair;
use serde::{Deserialize, Serialize};
use types::WeiAmount;

/// What a deposit of `eth_amount` costs and mints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAmounts {
    pub eth_amount: WeiAmount,
    /// `ceil(eth * token_reserve / eth_reserve)`
    pub token_required: WeiAmount,
    /// `floor(eth * total_liquidity / eth_reserve)`
    pub shares_minted: WeiAmount,
}

/// What burning `shares` pays out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAmounts {
    pub shares_burned: WeiAmount,
    pub eth_out: WeiAmount,
    pub token_out: WeiAmount,
}

pub struct LiquidityMath;

impl LiquidityMath {
    /// Shares minted when the pool is seeded: one per native unit
    pub fn genesis_shares(eth_amount: WeiAmount, token_amount: WeiAmount) -> Result<WeiAmount> {
        if eth_amount.is_zero() || token_amount.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        Ok(eth_amount)
    }

    pub fn deposit_amounts(
        eth_amount: WeiAmount,
        reserves: &ReservePair,
        total_liquidity: WeiAmount,
    ) -> Result<DepositAmounts> {
        if eth_amount.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        if total_liquidity.is_zero() || reserves.eth_reserve.is_zero() {
            return Err(AmmError::EmptyPool);
        }

        let token_required =
            WeiAmount::mul_div_ceil(eth_amount, reserves.token_reserve, reserves.eth_reserve)?;
        let shares_minted = WeiAmount::mul_div(eth_amount, total_liquidity, reserves.eth_reserve)?;

        // A deposit that mints nothing would be a donation to existing holders
        if shares_minted.is_zero() {
            return Err(AmmError::ZeroAmount);
        }

        Ok(DepositAmounts {
            eth_amount,
            token_required,
            shares_minted,
        })
    }

    pub fn withdraw_amounts(
        shares: WeiAmount,
        reserves: &ReservePair,
        total_liquidity: WeiAmount,
    ) -> Result<WithdrawAmounts> {
        if shares.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        if total_liquidity.is_zero() {
            return Err(AmmError::EmptyPool);
        }
        if shares > total_liquidity {
            return Err(AmmError::InsufficientLiquidity("shares exceed total supply"));
        }

        Ok(WithdrawAmounts {
            shares_burned: shares,
            eth_out: WeiAmount::mul_div(shares, reserves.eth_reserve, total_liquidity)?,
            token_out: WeiAmount::mul_div(shares, reserves.token_reserve, total_liquidity)?,
        })
    }
}
