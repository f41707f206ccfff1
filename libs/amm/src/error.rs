//! AMM calculation errors

use thiserror::Error;
use types::FixedPointError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    /// Trade or withdrawal would drain a reserve, or reserves are empty
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(&'static str),

    /// Input amount (or resulting share mint) is zero
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Liquidity math requested against a pool with no share supply
    #[error("Pool has no liquidity supply")]
    EmptyPool,

    #[error("Fee {0} bps is outside [0, 10000)")]
    InvalidFee(u32),

    #[error(transparent)]
    Arithmetic(#[from] FixedPointError),
}

pub type Result<T> = std::result::Result<T, AmmError>;
