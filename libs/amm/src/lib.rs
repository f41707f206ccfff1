//! # AMM Library - Exact Constant-Product Mathematics
//!
//! ## Purpose
//!
//! Pure pricing and liquidity-share math for a two-asset (native asset /
//! token) constant-product pool. Every function is side-effect free and
//! operates on 18-decimal fixed-point integers, so the same inputs always
//! produce the same outputs on every platform.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Reserve pair and liquidity supply read from the pool ledger
//! - **Output Destinations**: Trade executor, liquidity manager, quote previews
//! - **Precision**: 18-decimal integers with 256-bit intermediates (no floating point)
//! - **Rounding**: Floor everywhere except the token leg of a deposit (ceiling)
//!
//! ## Architecture Role
//!
//! ```text
//! Reserve Ledger → [ReservePair] → [ConstantProduct / LiquidityMath] → TradeQuote
//!                                              ↓                         ↓
//!                                      Executor / Manager          Price previews
//! ```

pub mod constant_product;
pub mod error;
pub mod liquidity;
pub mod pool_traits;
pub mod quote;

pub use constant_product::{ConstantProduct, DEFAULT_FEE_BPS, FEE_DENOMINATOR_BPS};
pub use error::{AmmError, Result};
pub use liquidity::{DepositAmounts, LiquidityMath, WithdrawAmounts};
pub use pool_traits::{AmmPool, CurveState, ReservePair, SwapDirection};
pub use quote::TradeQuote;

/// Common types for AMM calculations
pub use types::{WeiAmount, U256};
