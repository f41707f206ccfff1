//! Ephemeral trade quotes
//!
//! A quote is recomputed from the current reserves on every call and never
//! stored. It backs UI price previews; execution always prices again.

use crate::error::Result;
use crate::pool_traits::{AmmPool, ReservePair, SwapDirection};
use serde::{Deserialize, Serialize};
use types::WeiAmount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub direction: SwapDirection,
    pub amount_in: WeiAmount,
    pub amount_out: WeiAmount,
    pub reserve_in_after: WeiAmount,
    pub reserve_out_after: WeiAmount,
    pub price_impact_bps: u32,
}

impl TradeQuote {
    /// Price `amount_in` against `reserves` without touching them
    pub fn compute(
        reserves: &ReservePair,
        direction: SwapDirection,
        amount_in: WeiAmount,
        fee_bps: u32,
    ) -> Result<Self> {
        let curve = reserves.oriented(direction, fee_bps);
        let amount_out = curve.get_amount_out(amount_in)?;
        let price_impact_bps = curve.get_price_impact_bps(amount_in)?;

        Ok(Self {
            direction,
            amount_in,
            amount_out,
            reserve_in_after: curve.reserve_in.checked_add(amount_in)?,
            reserve_out_after: curve.reserve_out.checked_sub(amount_out)?,
            price_impact_bps,
        })
    }

    /// Reserve pair the pool would hold if this quote executed unchanged
    pub fn reserves_after(&self) -> ReservePair {
        match self.direction {
            SwapDirection::EthToToken => {
                ReservePair::new(self.reserve_in_after, self.reserve_out_after)
            }
            SwapDirection::TokenToEth => {
                ReservePair::new(self.reserve_out_after, self.reserve_in_after)
            }
        }
    }
}
