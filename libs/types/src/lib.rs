//! # DEX Core Types
//!
//! Shared value types for the two-asset exchange: 18-decimal fixed-point
//! amounts and 20-byte account identifiers.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: All asset amounts stored as scaled integers, never floats
//! - **Overflow Protection**: Checked arithmetic returning typed errors
//! - **Wide Intermediates**: Products evaluated in 256 bits before division
//! - **Clear Boundaries**: Decimal strings in, decimal strings out
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{AccountId, WeiAmount};
//!
//! let reserve = WeiAmount::from_decimal_str("5.0").unwrap();
//! let share = WeiAmount::mul_div(reserve, WeiAmount::ONE, WeiAmount::from_ether(5)).unwrap();
//! assert_eq!(share, WeiAmount::ONE);
//!
//! let provider = AccountId::from_low_u64(1);
//! println!("{} holds {}", provider, share);
//! ```

pub mod common;

pub use common::errors::{AccountIdError, FixedPointError};
pub use common::fixed_point::{WeiAmount, DECIMALS};
pub use common::identifiers::AccountId;

/// 256-bit intermediate integer used for invariant products
pub use web3::types::U256;
