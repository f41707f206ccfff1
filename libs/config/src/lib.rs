//! # DEX Centralized Configuration
//!
//! Configuration management and default values for the pool service and
//! its CLI.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dex_config::DexConfig;
//!
//! let config = DexConfig::load(None).unwrap();
//! let fee = config.pool.fee_bps;
//! let pool = config.pool_account().unwrap();
//! ```

pub mod service;
pub mod service_config;

pub use service_config::{
    load_config, DexConfig, LoggingSettings, PoolSettings, ServiceSettings, StorageSettings,
};
