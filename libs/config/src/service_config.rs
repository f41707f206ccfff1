//! DEX Configuration Module
//!
//! Provides configuration loading for the pool service and CLI.
//! Layering: built-in defaults → TOML file → `DEX__`-prefixed environment
//! variables (e.g. `DEX__POOL__FEE_BPS=25`).

use crate::service::{pool, service, storage};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use types::AccountId;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct DexConfig {
    pub pool: PoolSettings,
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Pool economics
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PoolSettings {
    /// Trading fee in basis points (30 = 0.3%)
    pub fee_bps: u32,
    /// Address the pool holds its reserves under
    pub pool_account: String,
    /// Extra allowance the sequencer requests on top of the exact deposit amount
    pub approval_cushion_bps: u32,
}

/// Serialised-writer service settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServiceSettings {
    pub mailbox_capacity: usize,
    pub op_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub state_dir: PathBuf,
    pub snapshot_file: String,
    pub ledger_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            fee_bps: pool::DEFAULT_FEE_BPS,
            pool_account: pool::DEFAULT_POOL_ACCOUNT.to_string(),
            approval_cushion_bps: pool::DEFAULT_APPROVAL_CUSHION_BPS,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: service::MAILBOX_CAPACITY,
            op_timeout_ms: service::OP_TIMEOUT_MS,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(storage::STATE_DIR),
            snapshot_file: storage::SNAPSHOT_FILE.to_string(),
            ledger_file: storage::LEDGER_FILE.to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DexConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                info!("Loading config: {:?}", path);
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from("config/dex.toml");
                if default_path.exists() {
                    info!("Loading config: {:?}", default_path);
                    builder = builder.add_source(File::from(default_path));
                } else {
                    debug!("No config file found, using defaults");
                }
            }
        }

        // Override with environment variables (DEX__ prefix)
        builder = builder.add_source(
            Environment::with_prefix("DEX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.finish()
    }

    /// Load from a TOML file only, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(File::from(path).required(true))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.expand_env_vars()?;
        self.validate()?;
        Ok(self)
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let raw = self.storage.state_dir.to_string_lossy().to_string();
        let expanded = shellexpand::full(&raw).context("Failed to expand state_dir")?;
        self.storage.state_dir = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.fee_bps >= 10_000 {
            bail!("pool.fee_bps must be below 10000, got {}", self.pool.fee_bps);
        }
        if self.pool.fee_bps > 1_000 {
            warn!("pool.fee_bps is unusually high: {}", self.pool.fee_bps);
        }
        if self.pool.approval_cushion_bps > 10_000 {
            bail!(
                "pool.approval_cushion_bps must not exceed 10000, got {}",
                self.pool.approval_cushion_bps
            );
        }
        if self.service.mailbox_capacity == 0 {
            bail!("service.mailbox_capacity must be positive");
        }
        if self.service.op_timeout_ms == 0 {
            bail!("service.op_timeout_ms must be positive");
        }
        self.pool_account()?;
        Ok(())
    }

    pub fn pool_account(&self) -> Result<AccountId> {
        AccountId::from_hex(&self.pool.pool_account)
            .with_context(|| format!("Invalid pool.pool_account '{}'", self.pool.pool_account))
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.service.op_timeout_ms)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.state_dir.join(&self.storage.snapshot_file)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.storage.state_dir.join(&self.storage.ledger_file)
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(path: Option<&Path>) -> Result<DexConfig> {
    DexConfig::load(path)
}
