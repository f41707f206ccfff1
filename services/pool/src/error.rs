//! Pool error taxonomy
//!
//! Every failure is a specific kind so callers can tell "needs approval"
//! from "price moved" from "pool empty". None of them leave the reserve
//! ledger partially updated.

use crate::assets::Asset;
use crate::sequencer::ApprovalState;
use amm::AmmError;
use std::time::Duration;
use thiserror::Error;
use types::{FixedPointError, WeiAmount};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool is not initialized")]
    NotInitialized,

    #[error("Pool is already initialized")]
    AlreadyInitialized,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Arithmetic underflow in {0}")]
    Underflow(&'static str),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(&'static str),

    #[error("Slippage exceeded: minimum {min}, actual {actual}")]
    SlippageExceeded { min: WeiAmount, actual: WeiAmount },

    #[error("Token input exceeds the authorised maximum: maximum {max}, required {required}")]
    MaxInputExceeded { max: WeiAmount, required: WeiAmount },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares {
        requested: WeiAmount,
        held: WeiAmount,
    },

    #[error("Allowance insufficient: required {required}, available {available}")]
    AllowanceInsufficient {
        required: WeiAmount,
        available: WeiAmount,
    },

    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        required: WeiAmount,
        available: WeiAmount,
    },

    #[error("Invalid fee: {0} bps")]
    InvalidFee(u32),

    #[error("Invalid approval transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ApprovalState,
        to: ApprovalState,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Pool service is closed")]
    ServiceClosed,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    /// Expected conditions the caller may retry with fresh parameters
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PoolError::SlippageExceeded { .. }
                | PoolError::MaxInputExceeded { .. }
                | PoolError::AllowanceInsufficient { .. }
                | PoolError::Timeout(_)
        )
    }

    /// The caller must step through the approval phase before retrying
    pub fn needs_approval(&self) -> bool {
        matches!(self, PoolError::AllowanceInsufficient { .. })
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::NotInitialized => "NotInitialized",
            PoolError::AlreadyInitialized => "AlreadyInitialized",
            PoolError::ZeroAmount => "ZeroAmount",
            PoolError::Underflow(_) => "Underflow",
            PoolError::Overflow(_) => "Overflow",
            PoolError::DivisionByZero => "DivisionByZero",
            PoolError::InvalidAmount(_) => "InvalidAmount",
            PoolError::InsufficientLiquidity(_) => "InsufficientLiquidity",
            PoolError::SlippageExceeded { .. } => "SlippageExceeded",
            PoolError::MaxInputExceeded { .. } => "MaxInputExceeded",
            PoolError::InsufficientShares { .. } => "InsufficientShares",
            PoolError::AllowanceInsufficient { .. } => "AllowanceInsufficient",
            PoolError::InsufficientBalance { .. } => "InsufficientBalance",
            PoolError::InvalidFee(_) => "InvalidFee",
            PoolError::InvalidTransition { .. } => "InvalidTransition",
            PoolError::Timeout(_) => "Timeout",
            PoolError::ServiceClosed => "ServiceClosed",
            PoolError::Persistence(_) => "Persistence",
        }
    }
}

impl From<FixedPointError> for PoolError {
    fn from(err: FixedPointError) -> Self {
        match err {
            FixedPointError::Overflow { operation } => PoolError::Overflow(operation),
            FixedPointError::Underflow { operation } => PoolError::Underflow(operation),
            FixedPointError::DivisionByZero => PoolError::DivisionByZero,
            other @ (FixedPointError::InvalidDecimal { .. }
            | FixedPointError::PrecisionLoss { .. }) => PoolError::InvalidAmount(other.to_string()),
        }
    }
}

impl From<AmmError> for PoolError {
    fn from(err: AmmError) -> Self {
        match err {
            AmmError::InsufficientLiquidity(reason) => PoolError::InsufficientLiquidity(reason),
            AmmError::ZeroAmount => PoolError::ZeroAmount,
            AmmError::EmptyPool => PoolError::NotInitialized,
            AmmError::InvalidFee(fee) => PoolError::InvalidFee(fee),
            AmmError::Arithmetic(inner) => inner.into(),
        }
    }
}
