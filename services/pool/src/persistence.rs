//! Snapshot persistence
//!
//! One record per file: a fixed header followed by a bincode payload.
//!
//! ```text
//! ┌────────┬─────────┬────────┬───────────┬──────────────┐
//! │ "DEXS" │ version │ crc32  │ len (u64) │ bincode body │
//! │ 4 B    │ u16 LE  │ u32 LE │ LE        │ len bytes    │
//! └────────┴─────────┴────────┴───────────┴──────────────┘
//! ```
//!
//! Writes go to a sibling temp file which is fsynced and then renamed over
//! the target, so readers see either the old record or the new one.

use crate::error::PoolError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"DEXS";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Not a snapshot file (bad magic)")]
    BadMagic,

    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    #[error("Snapshot truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Checksum mismatch: header {expected:#010x}, payload {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl From<SnapshotError> for PoolError {
    fn from(err: SnapshotError) -> Self {
        PoolError::Persistence(err.to_string())
    }
}

/// File-backed store for one serialisable record
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SnapshotError> {
        let payload = bincode::serialize(value)?;
        let checksum = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SnapshotError> {
        if bytes.len() < HEADER_LEN {
            return Err(SnapshotError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);

        if header[0..4] != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let expected = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[10..18]);
        let len = u64::from_le_bytes(len_bytes) as usize;

        if payload.len() != len {
            return Err(SnapshotError::Truncated {
                expected: HEADER_LEN + len,
                actual: bytes.len(),
            });
        }
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(SnapshotError::ChecksumMismatch { expected, actual });
        }

        Ok(bincode::deserialize(payload)?)
    }

    /// Atomically replace the stored record
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), SnapshotError> {
        let bytes = Self::encode(value)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!(path = ?self.path, bytes = bytes.len(), "Snapshot written");
        Ok(())
    }

    /// Load the stored record; `None` when no snapshot exists yet
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, SnapshotError> {
        if !self.path.exists() {
            info!(path = ?self.path, "No existing snapshot found");
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let value = Self::decode(&bytes)?;
        info!(path = ?self.path, "Snapshot restored");
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ReserveLedger;
    use tempfile::tempdir;
    use types::{AccountId, WeiAmount};

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("pool.bin"));
        assert!(store.load::<ReserveLedger>().unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_record() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("pool.bin"));

        let mut ledger = ReserveLedger::new();
        store.save(&ledger).unwrap();
        ledger
            .initialize(AccountId::from_low_u64(1), WeiAmount::ONE, WeiAmount::ONE)
            .unwrap();
        store.save(&ledger).unwrap();

        let loaded: ReserveLedger = store.load().unwrap().unwrap();
        assert_eq!(loaded, ledger);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = SnapshotStore::encode(&ReserveLedger::new()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = SnapshotStore::decode::<ReserveLedger>(&bytes).unwrap_err();
        assert!(matches!(err, SnapshotError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_rejects_foreign_file() {
        let err = SnapshotStore::decode::<ReserveLedger>(b"not a snapshot at all").unwrap_err();
        assert!(matches!(err, SnapshotError::BadMagic));

        let err = SnapshotStore::decode::<ReserveLedger>(b"DEX").unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { .. }));
    }
}
