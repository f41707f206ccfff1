//! # DEX Pool Service
//!
//! Transactional core of a two-asset constant-product exchange: a native
//! asset reserve and a fungible-token reserve, priced with `x * y = k` and
//! shared among liquidity providers through proportional shares.
//!
//! ## Architecture
//!
//! ```text
//! caller ─► TransactionSequencer ─► PoolHandle ─► PoolService (single writer)
//!           (approve, then act)      (mailbox)         │
//!                                                      ▼
//!                                                  Exchange ─► AssetLedger
//!                                                 ┌────┴────┐
//!                                        TradeExecutor  LiquidityManager
//!                                                 └────┬────┘
//!                                                 ReserveLedger ─► SnapshotStore
//! ```
//!
//! - [`ledger::ReserveLedger`]: reserves, liquidity supply and positions; atomic mutations
//! - [`executor::TradeExecutor`]: swap pricing, slippage guard, commit
//! - [`liquidity::LiquidityManager`]: proportional share mint and burn
//! - [`sequencer::TransactionSequencer`]: approve-then-act state machine
//! - [`exchange::Exchange`]: owned pool value moving assets around the ledger
//! - [`service::PoolService`]: serialised writer with deadlines and a read view
//! - [`persistence::SnapshotStore`]: checksummed atomic snapshots
//!
//! ## Example
//!
//! ```rust
//! use dex_pool::{Asset, AssetLedger, Exchange, InMemoryAssetLedger, SwapDirection};
//! use types::{AccountId, WeiAmount};
//!
//! # async fn demo() -> dex_pool::Result<()> {
//! let pool = AccountId::from_low_u64(0xd3c5);
//! let alice = AccountId::from_low_u64(1);
//!
//! let assets = InMemoryAssetLedger::new();
//! assets.mint(Asset::Native, alice, WeiAmount::from_ether(10))?;
//! assets.mint(Asset::Token, alice, WeiAmount::from_ether(10))?;
//! assets.approve(alice, pool, WeiAmount::from_ether(5)).await?;
//!
//! let mut exchange = Exchange::new(assets, pool, 30)?;
//! exchange
//!     .initialize_pool(alice, WeiAmount::from_ether(5), WeiAmount::from_ether(5))
//!     .await?;
//! let receipt = exchange
//!     .swap(alice, SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
//!     .await?;
//! assert_eq!(receipt.reserves.eth_reserve, WeiAmount::from_ether(6));
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod error;
pub mod exchange;
pub mod executor;
pub mod ledger;
pub mod liquidity;
pub mod persistence;
pub mod sequencer;
pub mod service;

pub use assets::{Asset, AssetLedger, InMemoryAssetLedger, LedgerState};
pub use error::{PoolError, Result};
pub use exchange::Exchange;
pub use executor::{TradeExecutor, TradeReceipt};
pub use ledger::ReserveLedger;
pub use liquidity::{DepositReceipt, LiquidityManager, WithdrawReceipt};
pub use persistence::{SnapshotError, SnapshotStore};
pub use sequencer::{ApprovalFlow, ApprovalState, TransactionSequencer};
pub use service::{PoolHandle, PoolService, PoolSnapshot, ServiceOptions};

pub use amm::{DepositAmounts, ReservePair, SwapDirection, TradeQuote, WithdrawAmounts};
