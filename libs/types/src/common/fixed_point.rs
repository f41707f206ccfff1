//! Fixed-point arithmetic for 18-decimal asset amounts
//!
//! Amounts are stored as `u128` integers scaled by 10^18 ("wei" units), the
//! native precision of both pool assets. Products are evaluated in a 256-bit
//! intermediate so `a * b / c` never overflows for any pair of 128-bit
//! operands.
//!
//! ## Rounding Policy
//!
//! Every division truncates toward zero. The only exception is
//! [`WeiAmount::mul_div_ceil`], which callers use where the pool charges a
//! depositor and must round against them.

use crate::common::errors::FixedPointError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use web3::types::U256;

/// Number of fractional digits carried by every amount
pub const DECIMALS: u32 = 18;

/// Non-negative asset amount with 18 decimal places
///
/// Examples:
/// - 1 ether = WeiAmount(1_000_000_000_000_000_000)
/// - 0.5 ether = WeiAmount(500_000_000_000_000_000)
/// - 1 wei = WeiAmount(1)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WeiAmount(pub u128);

impl WeiAmount {
    /// Scale factor for 18 decimal places
    pub const SCALE: u128 = 1_000_000_000_000_000_000;

    pub const ZERO: Self = Self(0);

    /// One whole unit (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    pub const MAX: Self = Self(u128::MAX);

    /// Create from whole units
    #[inline]
    pub const fn from_ether(units: u64) -> Self {
        Self(units as u128 * Self::SCALE)
    }

    /// Create from raw scaled integer
    #[inline]
    pub const fn from_wei(raw: u128) -> Self {
        Self(raw)
    }

    /// Get the raw scaled integer value
    #[inline]
    pub const fn raw_value(self) -> u128 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal string exactly
    ///
    /// This is the PRIMARY method for creating amounts from external data
    /// (CLI arguments, configuration, user input).
    ///
    /// # Examples
    /// ```
    /// use types::WeiAmount;
    ///
    /// let amount = WeiAmount::from_decimal_str("1.5").unwrap();
    /// assert_eq!(amount.raw_value(), 1_500_000_000_000_000_000);
    /// ```
    pub fn from_decimal_str(s: &str) -> Result<Self, FixedPointError> {
        let decimal = Decimal::from_str(s.trim()).map_err(|_| FixedPointError::InvalidDecimal {
            input: s.to_string(),
        })?;

        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(FixedPointError::InvalidDecimal {
                input: s.to_string(),
            });
        }
        if decimal.scale() > DECIMALS {
            return Err(FixedPointError::PrecisionLoss {
                input: s.to_string(),
            });
        }

        // Mantissa is at most 96 bits, so it always fits in u128
        let mantissa = decimal.mantissa().unsigned_abs();
        let factor = 10u128.pow(DECIMALS - decimal.scale());

        mantissa
            .checked_mul(factor)
            .map(Self)
            .ok_or(FixedPointError::Overflow {
                operation: "from_decimal_str",
            })
    }

    /// Convert to f64 for display only
    ///
    /// # Warning
    /// Never use for pool arithmetic.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Widen into the 256-bit intermediate type
    #[inline]
    pub fn to_u256(self) -> U256 {
        U256::from(self.0)
    }

    /// Narrow a 256-bit value back into an amount
    pub fn try_from_u256(value: U256, operation: &'static str) -> Result<Self, FixedPointError> {
        if value > U256::from(u128::MAX) {
            return Err(FixedPointError::Overflow { operation });
        }
        Ok(Self(value.low_u128()))
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(FixedPointError::Overflow { operation: "add" })
    }

    /// Checked subtraction - fails if the result would be negative
    pub fn checked_sub(self, rhs: Self) -> Result<Self, FixedPointError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(FixedPointError::Underflow { operation: "sub" })
    }

    /// `floor(a * b / c)` with a 256-bit intermediate product
    pub fn mul_div(a: Self, b: Self, c: Self) -> Result<Self, FixedPointError> {
        if c.is_zero() {
            return Err(FixedPointError::DivisionByZero);
        }
        let product = a.to_u256() * b.to_u256();
        Self::try_from_u256(product / c.to_u256(), "mul_div")
    }

    /// `ceil(a * b / c)` with a 256-bit intermediate product
    pub fn mul_div_ceil(a: Self, b: Self, c: Self) -> Result<Self, FixedPointError> {
        if c.is_zero() {
            return Err(FixedPointError::DivisionByZero);
        }
        let product = a.to_u256() * b.to_u256();
        let divisor = c.to_u256();
        let mut quotient = product / divisor;
        if !(product % divisor).is_zero() {
            quotient += U256::one();
        }
        Self::try_from_u256(quotient, "mul_div_ceil")
    }

    /// Scale by a basis-point factor, truncating: `floor(self * bps / 10_000)`
    pub fn mul_bps(self, bps: u32) -> Result<Self, FixedPointError> {
        Self::mul_div(self, Self(bps as u128), Self(10_000))
    }
}

/// Exact decimal rendering with trailing zeros trimmed, e.g. `5.0`, `0.8312`
impl fmt::Display for WeiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        if frac == 0 {
            return write!(f, "{}.0", whole);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for WeiAmount {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}
