//! Error types for fixed-point arithmetic and account identifier parsing
//!
//! Every arithmetic failure surfaces as a specific variant so the calling
//! layer can map it onto its own taxonomy without string matching.

use thiserror::Error;

/// Errors that can occur during fixed-point arithmetic operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    /// Result exceeds the maximum representable amount
    #[error("Overflow: result of {operation} exceeds maximum representable amount")]
    Overflow { operation: &'static str },

    /// Result would be negative
    #[error("Underflow: result of {operation} would be negative")]
    Underflow { operation: &'static str },

    /// Division by zero in fixed-point arithmetic
    #[error("Division by zero in fixed-point arithmetic")]
    DivisionByZero,

    /// Invalid decimal string format
    #[error("Invalid decimal string: '{input}' - expected non-negative numeric format")]
    InvalidDecimal { input: String },

    /// More fractional digits than the 18-decimal scale can hold
    #[error("Precision loss: '{input}' has more than 18 fractional digits")]
    PrecisionLoss { input: String },
}

/// Errors that can occur while parsing an account identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Invalid hex in account id '{input}'")]
    InvalidHex { input: String },

    #[error("Account id '{input}' must be exactly 20 bytes, got {len}")]
    InvalidLength { input: String, len: usize },
}
