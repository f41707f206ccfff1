//! Trade Executor
//!
//! Prices a swap against the current reserves, enforces the caller's
//! minimum output and commits the result to the Reserve Ledger in one step.
//! Planning and committing are split so the `Exchange` can validate asset
//! movements between the two.

use crate::error::{PoolError, Result};
use crate::ledger::ReserveLedger;
use amm::{ConstantProduct, ReservePair, SwapDirection, TradeQuote};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::WeiAmount;

/// Result of a committed swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub direction: SwapDirection,
    pub amount_in: WeiAmount,
    pub amount_out: WeiAmount,
    /// Reserves after the trade
    pub reserves: ReservePair,
}

#[derive(Debug, Clone, Copy)]
pub struct TradeExecutor {
    fee_bps: u32,
}

impl TradeExecutor {
    pub fn new(fee_bps: u32) -> Result<Self> {
        ConstantProduct::validate_fee(fee_bps)?;
        Ok(Self { fee_bps })
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Read-only quote; never touches the ledger
    pub fn preview(
        &self,
        ledger: &ReserveLedger,
        direction: SwapDirection,
        amount_in: WeiAmount,
    ) -> Result<TradeQuote> {
        if amount_in.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let reserves = ledger.require_initialized()?;
        Ok(TradeQuote::compute(&reserves, direction, amount_in, self.fee_bps)?)
    }

    /// Price the trade and enforce `min_amount_out` without mutating
    pub fn plan(
        &self,
        ledger: &ReserveLedger,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
    ) -> Result<TradeQuote> {
        let quote = self.preview(ledger, direction, amount_in)?;
        if quote.amount_out < min_amount_out {
            debug!(
                %direction,
                min = %min_amount_out,
                actual = %quote.amount_out,
                "Swap rejected by slippage guard"
            );
            return Err(PoolError::SlippageExceeded {
                min: min_amount_out,
                actual: quote.amount_out,
            });
        }
        Ok(quote)
    }

    /// Apply a planned trade to the ledger
    pub fn commit(&self, ledger: &mut ReserveLedger, quote: &TradeQuote) -> Result<TradeReceipt> {
        let reserves = ledger.apply_swap(quote.direction, quote.amount_in, quote.amount_out)?;
        info!(
            direction = %quote.direction,
            amount_in = %quote.amount_in,
            amount_out = %quote.amount_out,
            eth_reserve = %reserves.eth_reserve,
            token_reserve = %reserves.token_reserve,
            "Swap executed"
        );
        Ok(TradeReceipt {
            direction: quote.direction,
            amount_in: quote.amount_in,
            amount_out: quote.amount_out,
            reserves,
        })
    }

    /// Plan and commit in one call
    pub fn swap(
        &self,
        ledger: &mut ReserveLedger,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
    ) -> Result<TradeReceipt> {
        let quote = self.plan(ledger, direction, amount_in, min_amount_out)?;
        self.commit(ledger, &quote)
    }
}
