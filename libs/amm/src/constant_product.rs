//! Constant-product (x*y=k) swap math with exact integer calculations
//!
//! All values are 18-decimal [`WeiAmount`]s. Every division floors, so the
//! pool never pays out more than the ideal curve allows.

use crate::error::{AmmError, Result};
use types::{WeiAmount, U256};

/// Basis-point denominator for fees (10000 = 100%)
pub const FEE_DENOMINATOR_BPS: u32 = 10_000;

/// Default trading fee in basis points (30 = 0.3%)
pub const DEFAULT_FEE_BPS: u32 = 30;

/// Constant-product math functions
pub struct ConstantProduct;

impl ConstantProduct {
    /// Reject fees that would leave nothing of the input after the fee
    pub fn validate_fee(fee_bps: u32) -> Result<()> {
        if fee_bps >= FEE_DENOMINATOR_BPS {
            return Err(AmmError::InvalidFee(fee_bps));
        }
        Ok(())
    }

    /// Input amount credited to the curve: `floor(amount_in * (10000 - fee_bps) / 10000)`
    pub fn amount_in_after_fee(amount_in: WeiAmount, fee_bps: u32) -> Result<WeiAmount> {
        Self::validate_fee(fee_bps)?;
        Ok(amount_in.mul_bps(FEE_DENOMINATOR_BPS - fee_bps)?)
    }

    /// Calculate exact output amount using the x*y=k formula
    ///
    /// # Arguments
    /// * `amount_in` - Input asset amount
    /// * `reserve_in` - Input-side reserve
    /// * `reserve_out` - Output-side reserve
    /// * `fee_bps` - Fee in basis points (30 = 0.3%)
    ///
    /// # Returns
    /// `floor(after_fee * reserve_out / (reserve_in + after_fee))`, which is
    /// `reserve_out - k / (reserve_in + after_fee)` rounded toward the pool.
    pub fn quote_swap(
        amount_in: WeiAmount,
        reserve_in: WeiAmount,
        reserve_out: WeiAmount,
        fee_bps: u32,
    ) -> Result<WeiAmount> {
        if amount_in.is_zero() {
            return Err(AmmError::InsufficientLiquidity("input amount must be positive"));
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(AmmError::InsufficientLiquidity("reserves must be positive"));
        }

        let after_fee = Self::amount_in_after_fee(amount_in, fee_bps)?;
        let denominator = reserve_in.checked_add(after_fee)?;
        let amount_out = WeiAmount::mul_div(after_fee, reserve_out, denominator)?;

        if amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity("output would drain reserve"));
        }
        if amount_out.is_zero() {
            return Err(AmmError::InsufficientLiquidity("trade too small to produce output"));
        }

        Ok(amount_out)
    }

    /// Calculate the input required for a desired output (reverse calculation)
    ///
    /// Rounds up at each step so `quote_swap(result) >= amount_out`.
    pub fn quote_input_for_output(
        amount_out: WeiAmount,
        reserve_in: WeiAmount,
        reserve_out: WeiAmount,
        fee_bps: u32,
    ) -> Result<WeiAmount> {
        Self::validate_fee(fee_bps)?;
        if amount_out.is_zero() {
            return Err(AmmError::ZeroAmount);
        }
        if amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity("output exceeds reserves"));
        }

        let remaining = reserve_out.checked_sub(amount_out)?;
        let after_fee = WeiAmount::mul_div_ceil(reserve_in, amount_out, remaining)?;

        Ok(WeiAmount::mul_div_ceil(
            after_fee,
            WeiAmount::from_wei(FEE_DENOMINATOR_BPS as u128),
            WeiAmount::from_wei((FEE_DENOMINATOR_BPS - fee_bps) as u128),
        )?)
    }

    /// Spot-price movement caused by a trade, in basis points
    ///
    /// `10000 * (1 - price_after / price_before)` where price is
    /// `reserve_out / reserve_in`.
    pub fn price_impact_bps(
        amount_in: WeiAmount,
        reserve_in: WeiAmount,
        reserve_out: WeiAmount,
        fee_bps: u32,
    ) -> Result<u32> {
        let amount_out = Self::quote_swap(amount_in, reserve_in, reserve_out, fee_bps)?;
        let in_after = reserve_in.checked_add(amount_in)?;
        let out_after = reserve_out.checked_sub(amount_out)?;

        let scale = U256::from(FEE_DENOMINATOR_BPS);
        let numerator = out_after.to_u256() * reserve_in.to_u256();
        let denominator = in_after.to_u256() * reserve_out.to_u256();
        let retained = match numerator.checked_mul(scale) {
            Some(scaled) => scaled / denominator,
            // numerator near 2^256 implies denominator is at least as large
            None => numerator / (denominator / scale),
        };
        let retained_bps = retained.min(scale).low_u32();

        Ok(FEE_DENOMINATOR_BPS - retained_bps)
    }

    /// Price of one unit of the base asset in quote units, floored
    pub fn spot_price(reserve_base: WeiAmount, reserve_quote: WeiAmount) -> Result<WeiAmount> {
        if reserve_base.is_zero() {
            return Err(AmmError::InsufficientLiquidity("base reserve is empty"));
        }
        Ok(WeiAmount::mul_div(reserve_quote, WeiAmount::ONE, reserve_base)?)
    }

    /// The invariant product `k = x * y` in full 256-bit precision
    pub fn invariant(reserve_a: WeiAmount, reserve_b: WeiAmount) -> U256 {
        reserve_a.to_u256() * reserve_b.to_u256()
    }
}
