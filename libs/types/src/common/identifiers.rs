//! Account identifiers
//!
//! Accounts are full 20-byte addresses (never truncated). They render as
//! `0x`-prefixed lowercase hex and parse with or without the prefix.

use crate::common::errors::AccountIdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 20-byte account address of a trader, liquidity provider, or the pool itself
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `value` (big-endian)
    ///
    /// Handy for well-known development accounts.
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse from a hex string, with or without `0x`
    pub fn from_hex(input: &str) -> Result<Self, AccountIdError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let raw = hex::decode(digits).map_err(|_| AccountIdError::InvalidHex {
            input: input.to_string(),
        })?;

        let bytes: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AccountIdError::InvalidLength {
                input: input.to_string(),
                len: raw.len(),
            })?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
