//! Single-writer pool service
//!
//! [`PoolService`] owns the [`Exchange`] inside one tokio task and applies
//! commands from a bounded mailbox strictly one at a time. [`PoolHandle`] is
//! the cloneable async front door: mutations go through the mailbox, quote
//! previews read the last published [`PoolSnapshot`] without waiting.
//!
//! Every command carries a deadline that bounds its wait in the mailbox.
//! The actor admits a command only if the deadline has not passed and the
//! caller is still waiting; once admitted, the caller waits for the real
//! outcome however long the command runs. `Timeout` from a handle therefore
//! always means the command was never started.

use crate::assets::AssetLedger;
use crate::error::{PoolError, Result};
use crate::exchange::Exchange;
use crate::executor::{TradeExecutor, TradeReceipt};
use crate::ledger::ReserveLedger;
use crate::liquidity::{DepositReceipt, LiquidityManager, WithdrawReceipt};
use crate::persistence::SnapshotStore;
use amm::{DepositAmounts, ReservePair, SwapDirection, TradeQuote};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use types::{AccountId, WeiAmount};

/// Read view published after every committed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub ledger: ReserveLedger,
    pub fee_bps: u32,
}

impl PoolSnapshot {
    pub fn reserves(&self) -> ReservePair {
        self.ledger.reserves()
    }

    pub fn total_liquidity(&self) -> WeiAmount {
        self.ledger.total_liquidity()
    }

    pub fn position(&self, owner: &AccountId) -> WeiAmount {
        self.ledger.position(owner)
    }

    pub fn quote_swap(&self, direction: SwapDirection, amount_in: WeiAmount) -> Result<TradeQuote> {
        TradeExecutor::new(self.fee_bps)?.preview(&self.ledger, direction, amount_in)
    }

    pub fn quote_deposit(&self, eth_amount: WeiAmount) -> Result<DepositAmounts> {
        LiquidityManager::quote_deposit(&self.ledger, eth_amount)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub mailbox_capacity: usize,
    /// Default mailbox deadline for handles
    pub op_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            op_timeout: Duration::from_secs(30),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Initialize {
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
        reply: Reply<WeiAmount>,
    },
    Swap {
        trader: AccountId,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
        reply: Reply<TradeReceipt>,
    },
    Deposit {
        provider: AccountId,
        eth_amount: WeiAmount,
        max_token_in: Option<WeiAmount>,
        reply: Reply<DepositReceipt>,
    },
    Withdraw {
        provider: AccountId,
        shares: WeiAmount,
        reply: Reply<WithdrawReceipt>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::Swap { .. } => "swap",
            Command::Deposit { .. } => "deposit",
            Command::Withdraw { .. } => "withdraw",
            Command::Shutdown { .. } => "shutdown",
        }
    }

    /// Answer without executing
    fn reject(self, err: PoolError) {
        // A caller that already gave up has dropped its receiver
        match self {
            Command::Initialize { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Swap { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Deposit { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Withdraw { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

struct Envelope {
    deadline: Instant,
    timeout: Duration,
    admitted: oneshot::Sender<()>,
    command: Command,
}

pub struct PoolService<L> {
    exchange: Exchange<L>,
    mailbox: mpsc::Receiver<Envelope>,
    view: Arc<RwLock<PoolSnapshot>>,
    store: Option<SnapshotStore>,
}

impl<L: AssetLedger + 'static> PoolService<L> {
    /// Start the actor; the join handle yields the exchange back on shutdown
    pub fn spawn(
        exchange: Exchange<L>,
        options: ServiceOptions,
        store: Option<SnapshotStore>,
    ) -> (PoolHandle, JoinHandle<Exchange<L>>) {
        let (sender, mailbox) = mpsc::channel(options.mailbox_capacity.max(1));
        let view = Arc::new(RwLock::new(PoolSnapshot {
            ledger: exchange.ledger().clone(),
            fee_bps: exchange.fee_bps(),
        }));

        let service = Self {
            exchange,
            mailbox,
            view: view.clone(),
            store,
        };
        let task = tokio::spawn(service.run());

        let handle = PoolHandle {
            sender,
            view,
            timeout: options.op_timeout,
        };
        (handle, task)
    }

    async fn run(mut self) -> Exchange<L> {
        info!(
            pool = %self.exchange.pool_account(),
            fee_bps = self.exchange.fee_bps(),
            "Pool service started"
        );

        while let Some(envelope) = self.mailbox.recv().await {
            let Envelope {
                deadline,
                timeout,
                admitted,
                command,
            } = envelope;

            // A failed admission means the caller already reported Timeout
            if Instant::now() >= deadline || admitted.send(()).is_err() {
                warn!(command = command.name(), "Dropping expired command");
                command.reject(PoolError::Timeout(timeout));
                continue;
            }
            debug!(command = command.name(), "Processing command");

            match command {
                Command::Initialize {
                    provider,
                    eth_amount,
                    token_amount,
                    reply,
                } => {
                    let result = self
                        .exchange
                        .initialize_pool(provider, eth_amount, token_amount)
                        .await;
                    self.after(&result);
                    let _ = reply.send(result);
                }
                Command::Swap {
                    trader,
                    direction,
                    amount_in,
                    min_amount_out,
                    reply,
                } => {
                    let result = self
                        .exchange
                        .swap(trader, direction, amount_in, min_amount_out)
                        .await;
                    self.after(&result);
                    let _ = reply.send(result);
                }
                Command::Deposit {
                    provider,
                    eth_amount,
                    max_token_in,
                    reply,
                } => {
                    let result = self
                        .exchange
                        .deposit(provider, eth_amount, max_token_in)
                        .await;
                    self.after(&result);
                    let _ = reply.send(result);
                }
                Command::Withdraw {
                    provider,
                    shares,
                    reply,
                } => {
                    let result = self.exchange.withdraw(provider, shares).await;
                    self.after(&result);
                    let _ = reply.send(result);
                }
                Command::Shutdown { reply } => {
                    info!("Shutdown requested, draining mailbox");
                    self.mailbox.close();
                    let _ = reply.send(Ok(()));
                }
            }
        }

        self.persist();
        info!(
            sequence = self.exchange.ledger().sequence(),
            "Pool service stopped"
        );
        self.exchange
    }

    /// Publish and persist after a committed mutation
    fn after<T>(&self, result: &Result<T>) {
        if result.is_err() {
            return;
        }
        *self.view.write() = PoolSnapshot {
            ledger: self.exchange.ledger().clone(),
            fee_bps: self.exchange.fee_bps(),
        };
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            // The mutation is already committed; a failed write is reported, not undone
            if let Err(err) = store.save(self.exchange.ledger()) {
                error!(path = ?store.path(), error = %err, "Failed to persist pool snapshot");
            }
        }
    }
}

/// Cloneable async access to a running [`PoolService`]
#[derive(Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<Envelope>,
    view: Arc<RwLock<PoolSnapshot>>,
    timeout: Duration,
}

impl PoolHandle {
    /// Same service, different deadline for getting a command started
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        let (admitted, mut admission) = oneshot::channel();
        let envelope = Envelope {
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
            admitted,
            command: build(reply),
        };

        let queued = async {
            self.sender
                .send(envelope)
                .await
                .map_err(|_| PoolError::ServiceClosed)?;
            // Rejected commands are answered on `response`
            let _ = (&mut admission).await;
            Ok::<(), PoolError>(())
        };

        let waited = tokio::time::timeout(self.timeout, queued).await;
        match waited {
            Ok(sent) => sent?,
            Err(_) => {
                // An admission that raced the deadline still counts
                admission.close();
                if admission.try_recv().is_err() {
                    return Err(PoolError::Timeout(self.timeout));
                }
            }
        }

        response.await.map_err(|_| PoolError::ServiceClosed)?
    }

    pub async fn initialize_pool(
        &self,
        provider: AccountId,
        eth_amount: WeiAmount,
        token_amount: WeiAmount,
    ) -> Result<WeiAmount> {
        self.request(|reply| Command::Initialize {
            provider,
            eth_amount,
            token_amount,
            reply,
        })
        .await
    }

    pub async fn swap(
        &self,
        trader: AccountId,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
    ) -> Result<TradeReceipt> {
        self.request(|reply| Command::Swap {
            trader,
            direction,
            amount_in,
            min_amount_out,
            reply,
        })
        .await
    }

    pub async fn deposit(
        &self,
        provider: AccountId,
        eth_amount: WeiAmount,
        max_token_in: Option<WeiAmount>,
    ) -> Result<DepositReceipt> {
        self.request(|reply| Command::Deposit {
            provider,
            eth_amount,
            max_token_in,
            reply,
        })
        .await
    }

    pub async fn withdraw(&self, provider: AccountId, shares: WeiAmount) -> Result<WithdrawReceipt> {
        self.request(|reply| Command::Withdraw {
            provider,
            shares,
            reply,
        })
        .await
    }

    /// Stop accepting commands; queued ones still run
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Last published state; may trail commands still in the mailbox
    pub fn snapshot(&self) -> PoolSnapshot {
        self.view.read().clone()
    }

    pub fn reserves(&self) -> ReservePair {
        self.view.read().reserves()
    }

    pub fn total_liquidity(&self) -> WeiAmount {
        self.view.read().total_liquidity()
    }

    pub fn position(&self, owner: &AccountId) -> WeiAmount {
        self.view.read().position(owner)
    }

    /// Advisory quote from the published view; `swap` prices again
    pub fn quote_swap(&self, direction: SwapDirection, amount_in: WeiAmount) -> Result<TradeQuote> {
        self.view.read().quote_swap(direction, amount_in)
    }

    pub fn quote_deposit(&self, eth_amount: WeiAmount) -> Result<DepositAmounts> {
        self.view.read().quote_deposit(eth_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, InMemoryAssetLedger};

    fn pool() -> AccountId {
        AccountId::from_low_u64(0xd3c5)
    }

    fn alice() -> AccountId {
        AccountId::from_low_u64(1)
    }

    async fn running() -> (PoolHandle, JoinHandle<Exchange<Arc<InMemoryAssetLedger>>>) {
        let assets = Arc::new(InMemoryAssetLedger::new());
        assets.mint(Asset::Native, alice(), WeiAmount::from_ether(50)).unwrap();
        assets.mint(Asset::Token, alice(), WeiAmount::from_ether(50)).unwrap();
        assets
            .approve(alice(), pool(), WeiAmount::from_ether(50))
            .await
            .unwrap();

        let exchange = Exchange::new(assets, pool(), 30).unwrap();
        PoolService::spawn(exchange, ServiceOptions::default(), None)
    }

    #[tokio::test]
    async fn test_view_follows_commits() {
        let (handle, task) = running().await;
        assert!(handle.reserves().is_empty());

        handle
            .initialize_pool(alice(), WeiAmount::from_ether(5), WeiAmount::from_ether(5))
            .await
            .unwrap();
        assert_eq!(handle.reserves().eth_reserve, WeiAmount::from_ether(5));
        assert_eq!(handle.position(&alice()), WeiAmount::from_ether(5));

        let quote = handle
            .quote_swap(SwapDirection::EthToToken, WeiAmount::ONE)
            .unwrap();
        let receipt = handle
            .swap(alice(), SwapDirection::EthToToken, WeiAmount::ONE, quote.amount_out)
            .await
            .unwrap();
        assert_eq!(receipt.amount_out, quote.amount_out);

        handle.shutdown().await.unwrap();
        let exchange = task.await.unwrap();
        assert_eq!(exchange.reserves(), handle.reserves());
    }

    #[tokio::test]
    async fn test_closed_service_reports_closed() {
        let (handle, task) = running().await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let err = handle
            .withdraw(alice(), WeiAmount::ONE)
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::ServiceClosed);
    }

    #[tokio::test]
    async fn test_failed_command_does_not_publish() {
        let (handle, _task) = running().await;
        let err = handle
            .swap(alice(), SwapDirection::EthToToken, WeiAmount::ONE, WeiAmount::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::NotInitialized);
        assert_eq!(handle.snapshot().ledger.sequence(), 0);
    }
}
