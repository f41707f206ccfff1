//! dexctl - command-line front end for the pool service
//!
//! Runs one command against the persisted pool and development ledger in the
//! configured state directory, then writes both back. Results are printed as
//! JSON on stdout; logs go to stderr.
//!
//! The development ledger file carries the pool ledger it was saved with, so
//! balances and reserves always come back as a matching pair even if the
//! process stopped between the two writes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dex_config::{DexConfig, LoggingSettings};
use dex_pool::{
    Asset, AssetLedger, Exchange, InMemoryAssetLedger, LedgerState, PoolHandle, PoolService,
    ReserveLedger, ServiceOptions, SnapshotStore, SwapDirection, TransactionSequencer,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::{AccountId, WeiAmount};

#[derive(Parser, Debug)]
#[command(name = "dexctl")]
#[command(about = "Two-asset constant-product pool")]
struct Args {
    /// Configuration file (defaults to config/dex.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed an empty pool (approves the token leg first)
    Init {
        #[arg(long)]
        provider: AccountId,
        #[arg(long)]
        eth: WeiAmount,
        #[arg(long)]
        token: WeiAmount,
    },
    /// Credit development funds to an account
    Fund {
        #[arg(long)]
        account: AccountId,
        #[arg(long, default_value = "0")]
        eth: WeiAmount,
        #[arg(long, default_value = "0")]
        token: WeiAmount,
    },
    /// Set the pool's token allowance for an owner
    Approve {
        #[arg(long)]
        owner: AccountId,
        #[arg(long)]
        amount: WeiAmount,
    },
    /// Trade against the pool
    Swap {
        #[arg(long)]
        trader: AccountId,
        /// eth-to-token or token-to-eth
        #[arg(long)]
        direction: SwapDirection,
        #[arg(long)]
        amount: WeiAmount,
        #[arg(long, default_value = "0")]
        min_out: WeiAmount,
        /// Submit without the approval phase
        #[arg(long)]
        no_approve: bool,
    },
    /// Preview a trade without executing it
    Quote {
        #[arg(long)]
        direction: SwapDirection,
        #[arg(long)]
        amount: WeiAmount,
    },
    /// Add liquidity at the current ratio
    Deposit {
        #[arg(long)]
        provider: AccountId,
        #[arg(long)]
        eth: WeiAmount,
        /// Submit without the approval phase, bounded by this token amount
        #[arg(long)]
        max_token: Option<WeiAmount>,
    },
    /// Burn liquidity shares
    Withdraw {
        #[arg(long)]
        provider: AccountId,
        #[arg(long)]
        shares: WeiAmount,
    },
    /// Show reserves, supply and spot price
    Reserves,
    /// Show an account's shares and its claim on the reserves
    Position {
        #[arg(long)]
        owner: AccountId,
    },
    /// Show an account's balances and allowance
    Balances {
        #[arg(long)]
        account: AccountId,
    },
}

/// Development chain state written in one atomic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DevChain {
    assets: LedgerState,
    pool: ReserveLedger,
}

/// Pool ledger to resume from: the copy saved with the balances wins
fn resume_ledger(chain: Option<&DevChain>, snapshot: Option<ReserveLedger>) -> ReserveLedger {
    match (chain, snapshot) {
        (Some(chain), Some(snapshot)) => {
            if snapshot != chain.pool {
                warn!(
                    saved = chain.pool.sequence(),
                    snapshot = snapshot.sequence(),
                    "Pool snapshot does not match the development ledger, using the ledger's copy"
                );
            }
            chain.pool.clone()
        }
        (Some(chain), None) => chain.pool.clone(),
        (None, snapshot) => snapshot.unwrap_or_default(),
    }
}

fn init_tracing(settings: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if settings.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = DexConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let pool_account = config.pool_account()?;
    let ledger_store = SnapshotStore::new(config.ledger_path());
    let pool_store = SnapshotStore::new(config.snapshot_path());

    let chain = ledger_store
        .load::<DevChain>()
        .context("Failed to load development ledger")?;
    let snapshot = pool_store
        .load::<ReserveLedger>()
        .context("Failed to load pool snapshot")?;
    let reserve_ledger = resume_ledger(chain.as_ref(), snapshot);
    let ledger_state = chain.map(|chain| chain.assets).unwrap_or_default();
    let assets = Arc::new(InMemoryAssetLedger::from_state(ledger_state));

    let exchange = Exchange::restore(
        reserve_ledger,
        assets.clone(),
        pool_account,
        config.pool.fee_bps,
    )
    .context("Failed to restore pool state")?;

    let options = ServiceOptions {
        mailbox_capacity: config.service.mailbox_capacity,
        op_timeout: config.op_timeout(),
    };
    let (handle, task) = PoolService::spawn(exchange, options, Some(pool_store));
    let sequencer = TransactionSequencer::new(assets.clone(), pool_account, config.op_timeout())
        .with_cushion_bps(config.pool.approval_cushion_bps);

    let outcome = run(args.command, &handle, &sequencer, &assets, pool_account).await;
    let chain = DevChain {
        assets: assets.snapshot(),
        pool: handle.snapshot().ledger,
    };
    ledger_store
        .save(&chain)
        .context("Failed to save development ledger")?;

    handle.shutdown().await.context("Failed to stop pool service")?;
    task.await.context("Pool service task failed")?;

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(
    command: Command,
    pool: &PoolHandle,
    sequencer: &TransactionSequencer<Arc<InMemoryAssetLedger>>,
    assets: &InMemoryAssetLedger,
    pool_account: AccountId,
) -> Result<Value> {
    let output = match command {
        Command::Init {
            provider,
            eth,
            token,
        } => {
            let mut flow = sequencer.flow(provider, token);
            sequencer.ensure_allowance(&mut flow).await?;
            let shares = sequencer
                .debit(&mut flow, pool.initialize_pool(provider, eth, token))
                .await?;
            info!(%provider, %shares, "Pool seeded");
            json!({
                "provider": provider.to_string(),
                "shares": shares.to_string(),
                "reserves": reserves_json(pool),
            })
        }
        Command::Fund {
            account,
            eth,
            token,
        } => {
            assets.mint(Asset::Native, account, eth)?;
            assets.mint(Asset::Token, account, token)?;
            balances_json(assets, account, pool_account).await?
        }
        Command::Approve { owner, amount } => {
            assets.approve(owner, pool_account, amount).await?;
            balances_json(assets, owner, pool_account).await?
        }
        Command::Swap {
            trader,
            direction,
            amount,
            min_out,
            no_approve,
        } => {
            let receipt = if no_approve {
                pool.swap(trader, direction, amount, min_out).await?
            } else {
                sequencer
                    .swap(pool, trader, direction, amount, min_out)
                    .await?
            };
            json!({
                "direction": receipt.direction.to_string(),
                "amount_in": receipt.amount_in.to_string(),
                "amount_out": receipt.amount_out.to_string(),
                "reserves": reserves_json(pool),
            })
        }
        Command::Quote { direction, amount } => {
            let quote = pool.quote_swap(direction, amount)?;
            json!({
                "direction": quote.direction.to_string(),
                "amount_in": quote.amount_in.to_string(),
                "amount_out": quote.amount_out.to_string(),
                "price_impact_bps": quote.price_impact_bps,
            })
        }
        Command::Deposit {
            provider,
            eth,
            max_token,
        } => {
            let receipt = match max_token {
                Some(max) => pool.deposit(provider, eth, Some(max)).await?,
                None => sequencer.deposit(pool, provider, eth).await?,
            };
            json!({
                "eth_amount": receipt.eth_amount.to_string(),
                "token_amount": receipt.token_amount.to_string(),
                "shares_minted": receipt.shares_minted.to_string(),
                "reserves": reserves_json(pool),
            })
        }
        Command::Withdraw { provider, shares } => {
            let receipt = pool.withdraw(provider, shares).await?;
            json!({
                "shares_burned": receipt.shares_burned.to_string(),
                "eth_amount": receipt.eth_amount.to_string(),
                "token_amount": receipt.token_amount.to_string(),
                "reserves": reserves_json(pool),
            })
        }
        Command::Reserves => reserves_json(pool),
        Command::Position { owner } => {
            let snapshot = pool.snapshot();
            let shares = snapshot.position(&owner);
            let claim = if shares.is_zero() {
                json!(null)
            } else {
                let reserves = snapshot.reserves();
                let total = snapshot.total_liquidity();
                json!({
                    "eth": WeiAmount::mul_div(shares, reserves.eth_reserve, total)?.to_string(),
                    "token": WeiAmount::mul_div(shares, reserves.token_reserve, total)?.to_string(),
                })
            };
            json!({
                "owner": owner.to_string(),
                "shares": shares.to_string(),
                "total_liquidity": snapshot.total_liquidity().to_string(),
                "claim": claim,
            })
        }
        Command::Balances { account } => balances_json(assets, account, pool_account).await?,
    };
    Ok(output)
}

fn reserves_json(pool: &PoolHandle) -> Value {
    let snapshot = pool.snapshot();
    let reserves = snapshot.reserves();
    json!({
        "eth_reserve": reserves.eth_reserve.to_string(),
        "token_reserve": reserves.token_reserve.to_string(),
        "total_liquidity": snapshot.total_liquidity().to_string(),
        "token_per_eth": reserves.token_per_eth().ok().map(|p| p.to_string()),
        "fee_bps": snapshot.fee_bps,
    })
}

async fn balances_json(
    assets: &InMemoryAssetLedger,
    account: AccountId,
    pool_account: AccountId,
) -> Result<Value> {
    Ok(json!({
        "account": account.to_string(),
        "native": assets.balance_of(Asset::Native, account).await?.to_string(),
        "token": assets.balance_of(Asset::Token, account).await?.to_string(),
        "allowance": assets.allowance(account, pool_account).await?.to_string(),
    }))
}
