//! Reserve pair, swap direction, and the unified pool pricing interface

use crate::constant_product::ConstantProduct;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use types::{WeiAmount, U256};

/// Which asset the trader pays in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Pay the native asset, receive the token
    EthToToken,
    /// Pay the token, receive the native asset
    TokenToEth,
}

impl SwapDirection {
    /// Whether the trader's input leg is the token (and therefore needs an allowance)
    pub fn debits_token(self) -> bool {
        matches!(self, SwapDirection::TokenToEth)
    }

    pub fn reverse(self) -> Self {
        match self {
            SwapDirection::EthToToken => SwapDirection::TokenToEth,
            SwapDirection::TokenToEth => SwapDirection::EthToToken,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::EthToToken => write!(f, "eth-to-token"),
            SwapDirection::TokenToEth => write!(f, "token-to-eth"),
        }
    }
}

impl FromStr for SwapDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "eth-to-token" | "ethtotoken" => Ok(SwapDirection::EthToToken),
            "token-to-eth" | "tokentoeth" => Ok(SwapDirection::TokenToEth),
            other => Err(format!("unknown swap direction '{}'", other)),
        }
    }
}

/// The pool's two reserves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePair {
    pub eth_reserve: WeiAmount,
    pub token_reserve: WeiAmount,
}

impl ReservePair {
    pub fn new(eth_reserve: WeiAmount, token_reserve: WeiAmount) -> Self {
        Self {
            eth_reserve,
            token_reserve,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eth_reserve.is_zero() && self.token_reserve.is_zero()
    }

    /// `(reserve_in, reserve_out)` for a trade in `direction`
    pub fn ordered(&self, direction: SwapDirection) -> (WeiAmount, WeiAmount) {
        match direction {
            SwapDirection::EthToToken => (self.eth_reserve, self.token_reserve),
            SwapDirection::TokenToEth => (self.token_reserve, self.eth_reserve),
        }
    }

    /// Curve view for pricing a trade in `direction`
    pub fn oriented(&self, direction: SwapDirection, fee_bps: u32) -> CurveState {
        let (reserve_in, reserve_out) = self.ordered(direction);
        CurveState {
            reserve_in,
            reserve_out,
            fee_bps,
        }
    }

    /// Reserves after a trade: input side grows, output side shrinks
    pub fn after_swap(
        &self,
        direction: SwapDirection,
        amount_in: WeiAmount,
        amount_out: WeiAmount,
    ) -> Result<Self> {
        let (reserve_in, reserve_out) = self.ordered(direction);
        let reserve_in = reserve_in.checked_add(amount_in)?;
        let reserve_out = reserve_out.checked_sub(amount_out)?;
        Ok(match direction {
            SwapDirection::EthToToken => Self::new(reserve_in, reserve_out),
            SwapDirection::TokenToEth => Self::new(reserve_out, reserve_in),
        })
    }

    /// Invariant product `k`
    pub fn invariant(&self) -> U256 {
        ConstantProduct::invariant(self.eth_reserve, self.token_reserve)
    }

    /// Token per native unit
    pub fn token_per_eth(&self) -> Result<WeiAmount> {
        ConstantProduct::spot_price(self.eth_reserve, self.token_reserve)
    }
}

/// Reserves oriented for one trade direction, plus the fee tier
#[derive(Debug, Clone, Copy)]
pub struct CurveState {
    pub reserve_in: WeiAmount,
    pub reserve_out: WeiAmount,
    pub fee_bps: u32, // Fee in basis points (30 = 0.3%)
}

/// Unified pool pricing interface
pub trait AmmPool {
    /// Calculate output amount for given input
    fn get_amount_out(&self, amount_in: WeiAmount) -> Result<WeiAmount>;

    /// Calculate required input for desired output
    fn get_amount_in(&self, amount_out: WeiAmount) -> Result<WeiAmount>;

    /// Spot-price movement of a trade in basis points
    fn get_price_impact_bps(&self, amount_in: WeiAmount) -> Result<u32>;

    /// Get fee tier
    fn get_fee_bps(&self) -> u32;
}

impl AmmPool for CurveState {
    fn get_amount_out(&self, amount_in: WeiAmount) -> Result<WeiAmount> {
        ConstantProduct::quote_swap(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
    }

    fn get_amount_in(&self, amount_out: WeiAmount) -> Result<WeiAmount> {
        ConstantProduct::quote_input_for_output(
            amount_out,
            self.reserve_in,
            self.reserve_out,
            self.fee_bps,
        )
    }

    fn get_price_impact_bps(&self, amount_in: WeiAmount) -> Result<u32> {
        ConstantProduct::price_impact_bps(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
    }

    fn get_fee_bps(&self) -> u32 {
        self.fee_bps
    }
}
