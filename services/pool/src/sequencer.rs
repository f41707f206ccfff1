//! Transaction Sequencer
//!
//! Two-phase approve-then-act protocol for every operation that debits the
//! token from a caller. Phase one makes sure the pool holds a confirmed
//! allowance, phase two submits the debit. The phases are not atomic: the
//! pool re-checks the allowance when the debit executes.
//!
//! ```text
//! NoAllowance ──► Approving ──► Approved ──► Debited
//!      ▲              │            │
//!      └──────────────┴────────────┘  (approval timed out / allowance lowered)
//! ```

use crate::assets::AssetLedger;
use crate::error::{PoolError, Result};
use crate::executor::TradeReceipt;
use crate::liquidity::DepositReceipt;
use crate::service::PoolHandle;
use amm::SwapDirection;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use types::{AccountId, WeiAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    NoAllowance,
    Approving,
    Approved,
    Debited,
}

impl ApprovalState {
    pub fn can_transition_to(self, next: ApprovalState) -> bool {
        use ApprovalState::*;
        matches!(
            (self, next),
            (NoAllowance, Approving)
                | (NoAllowance, Approved)
                | (Approving, Approved)
                | (Approving, NoAllowance)
                | (Approved, Debited)
                | (Approved, NoAllowance)
        )
    }
}

/// Progress of one approve-then-act flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalFlow {
    owner: AccountId,
    spender: AccountId,
    required: WeiAmount,
    state: ApprovalState,
}

impl ApprovalFlow {
    pub fn new(owner: AccountId, spender: AccountId, required: WeiAmount) -> Self {
        Self {
            owner,
            spender,
            required,
            state: ApprovalState::NoAllowance,
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn spender(&self) -> AccountId {
        self.spender
    }

    pub fn required(&self) -> WeiAmount {
        self.required
    }

    pub fn state(&self) -> ApprovalState {
        self.state
    }

    pub fn transition(&mut self, next: ApprovalState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(PoolError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(owner = %self.owner, from = ?self.state, to = ?next, "Approval flow transition");
        self.state = next;
        Ok(())
    }
}

pub struct TransactionSequencer<L> {
    assets: L,
    pool_account: AccountId,
    /// Extra allowance requested on top of an exact deposit amount
    cushion_bps: u32,
    timeout: Duration,
}

impl<L: AssetLedger> TransactionSequencer<L> {
    pub fn new(assets: L, pool_account: AccountId, timeout: Duration) -> Self {
        Self {
            assets,
            pool_account,
            cushion_bps: 0,
            timeout,
        }
    }

    pub fn with_cushion_bps(mut self, cushion_bps: u32) -> Self {
        self.cushion_bps = cushion_bps;
        self
    }

    pub fn flow(&self, owner: AccountId, required: WeiAmount) -> ApprovalFlow {
        ApprovalFlow::new(owner, self.pool_account, required)
    }

    /// Phase one: read the allowance and approve only if it falls short
    ///
    /// The approval is bounded by the sequencer timeout; on expiry the flow
    /// returns to `NoAllowance` and nothing is debited.
    pub async fn ensure_allowance(&self, flow: &mut ApprovalFlow) -> Result<()> {
        let available = self.assets.allowance(flow.owner, flow.spender).await?;
        if available >= flow.required {
            return flow.transition(ApprovalState::Approved);
        }

        flow.transition(ApprovalState::Approving)?;
        info!(
            owner = %flow.owner,
            required = %flow.required,
            %available,
            "Submitting approval"
        );

        let approval = self.assets.approve(flow.owner, flow.spender, flow.required);
        match tokio::time::timeout(self.timeout, approval).await {
            Ok(Ok(())) => flow.transition(ApprovalState::Approved),
            Ok(Err(err)) => {
                flow.transition(ApprovalState::NoAllowance)?;
                Err(err)
            }
            Err(_) => {
                warn!(owner = %flow.owner, timeout = ?self.timeout, "Approval not confirmed in time");
                flow.transition(ApprovalState::NoAllowance)?;
                Err(PoolError::Timeout(self.timeout))
            }
        }
    }

    /// Phase two: submit the debiting operation for an approved flow
    pub async fn debit<T, F>(&self, flow: &mut ApprovalFlow, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if flow.state != ApprovalState::Approved {
            return Err(PoolError::InvalidTransition {
                from: flow.state,
                to: ApprovalState::Debited,
            });
        }

        match operation.await {
            Ok(value) => {
                flow.transition(ApprovalState::Debited)?;
                Ok(value)
            }
            Err(err) => {
                if err.needs_approval() {
                    flow.transition(ApprovalState::NoAllowance)?;
                }
                Err(err)
            }
        }
    }

    /// Swap in either direction; only the token side needs the approval phase
    pub async fn swap(
        &self,
        pool: &PoolHandle,
        trader: AccountId,
        direction: SwapDirection,
        amount_in: WeiAmount,
        min_amount_out: WeiAmount,
    ) -> Result<TradeReceipt> {
        if !direction.debits_token() {
            return pool.swap(trader, direction, amount_in, min_amount_out).await;
        }
        if amount_in.is_zero() {
            return Err(PoolError::ZeroAmount);
        }

        let mut flow = self.flow(trader, amount_in);
        self.ensure_allowance(&mut flow).await?;
        self.debit(
            &mut flow,
            pool.swap(trader, direction, amount_in, min_amount_out),
        )
        .await
    }

    /// Deposit with an approval sized from the current deposit quote
    ///
    /// The quoted token amount (plus cushion) doubles as `max_token_in`, so a
    /// price move between the phases fails cleanly instead of over-charging.
    pub async fn deposit(
        &self,
        pool: &PoolHandle,
        provider: AccountId,
        eth_amount: WeiAmount,
    ) -> Result<DepositReceipt> {
        let quote = pool.quote_deposit(eth_amount)?;
        let cushion = quote.token_required.mul_bps(self.cushion_bps)?;
        let required = quote.token_required.checked_add(cushion)?;

        let mut flow = self.flow(provider, required);
        self.ensure_allowance(&mut flow).await?;
        self.debit(&mut flow, pool.deposit(provider, eth_amount, Some(required)))
            .await
    }
}
