//! Swap coordinator - drives one accepted fill through the cross-chain
//! HTLC lifecycle
//!
//! One state machine per swap:
//!
//! ```text
//! Created -> Bid -> SourceEscrowed -> DestEscrowed -> SecretRevealed -> Claimed
//!    |       |            |                |
//!    +-------+------------+----------------+---> Cancelled (timelock expiry)
//!    +-------+------------+----------------+---> Failed    (retries exhausted)
//! ```
//!
//! Revealing the secret is the atomicity commit point: once the secret is
//! public on one chain the counter-party can always claim, so neither
//! `Cancelled` nor `Failed` is reachable past `SecretRevealed`.
//!
//! Each swap is sequenced by its own async mutex, held for the duration of a
//! single transition (including the adapter call it wraps) and released
//! between transitions so the recovery supervisor interleaves cooperatively.
//! Different swaps proceed independently and in parallel.

use crate::chain::{AdapterRegistry, ChainId, EscrowParams, OrderId, Secret};
use crate::commitment::{keccak256, Hash32};
use crate::config::{ResolverConfig, TimelockConfig};
use crate::error::{ResolverError, ResolverResult};

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle states of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapState {
    Created,
    Bid,
    SourceEscrowed,
    DestEscrowed,
    SecretRevealed,
    Claimed,
    Cancelled,
    Failed,
}

impl SwapState {
    /// Terminal states are never left
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapState::Claimed | SwapState::Cancelled | SwapState::Failed
        )
    }

    /// At or past the commit point: cancellation is unreachable
    pub fn past_reveal(&self) -> bool {
        matches!(self, SwapState::SecretRevealed | SwapState::Claimed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwapState::Created => "created",
            SwapState::Bid => "bid",
            SwapState::SourceEscrowed => "source_escrowed",
            SwapState::DestEscrowed => "dest_escrowed",
            SwapState::SecretRevealed => "secret_revealed",
            SwapState::Claimed => "claimed",
            SwapState::Cancelled => "cancelled",
            SwapState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs for a new swap, produced from an accepted fill
#[derive(Debug, Clone)]
pub struct SwapSpec {
    pub order_id: OrderId,
    pub resolver: String,
    pub maker: String,
    /// Source-asset units this fill covers
    pub amount: u128,
    /// Destination-asset units owed for this fill at the agreed price
    pub quote: u128,
    /// Hash lock of the filled slice
    pub hash_lock: Hash32,
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    pub src_token: String,
    pub dst_token: String,
}

/// One in-flight cross-chain swap
#[derive(Debug, Clone)]
pub struct Swap {
    pub id: Uuid,
    pub order_id: OrderId,
    pub resolver: String,
    pub maker: String,
    pub amount: u128,
    pub quote: u128,
    pub hash_lock: Hash32,
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    pub src_token: String,
    pub dst_token: String,
    pub timelock_src: u64,
    pub timelock_dst: u64,
    pub state: SwapState,
    pub src_escrow: Option<crate::chain::EscrowRef>,
    pub dst_escrow: Option<crate::chain::EscrowRef>,
    pub src_cancelled: bool,
    pub dst_cancelled: bool,
    /// Source-chain time of creation and last transition
    pub created_at: u64,
    pub updated_at: u64,
}

impl Swap {
    fn can_transition(&self, to: SwapState) -> bool {
        use SwapState::*;
        matches!(
            (self.state, to),
            (Created, Bid)
                | (Bid, SourceEscrowed)
                | (SourceEscrowed, DestEscrowed)
                | (DestEscrowed, SecretRevealed)
                | (SecretRevealed, Claimed)
                | (Created | Bid | SourceEscrowed | DestEscrowed, Cancelled)
                | (Created | Bid | SourceEscrowed | DestEscrowed, Failed)
        )
    }

    /// The timelock that currently gates full recovery of this swap
    pub fn governing_timelock(&self) -> u64 {
        if self.src_escrow.is_some() && !self.src_cancelled {
            self.timelock_src
        } else if self.dst_escrow.is_some() && !self.dst_cancelled {
            self.timelock_dst
        } else {
            // No escrow outstanding; the source window bounds the attempt
            self.timelock_src
        }
    }
}

/// Operator-facing view of one swap
#[derive(Debug, Clone, Serialize)]
pub struct SwapView {
    pub swap_id: Uuid,
    #[serde(serialize_with = "crate::auction::serialize_order_id")]
    pub order_id: OrderId,
    pub resolver: String,
    pub state: SwapState,
    pub amount: u128,
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    pub timelock_src: u64,
    pub timelock_dst: u64,
    pub updated_at: u64,
}

/// Drives accepted fills through the HTLC lifecycle on an adapter pair
pub struct SwapCoordinator {
    adapters: Arc<AdapterRegistry>,
    swaps: DashMap<Uuid, Arc<Mutex<Swap>>>,
    max_retries: u32,
    retry_delay: Duration,
    timelocks: TimelockConfig,
}

impl SwapCoordinator {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        config: &ResolverConfig,
        timelocks: TimelockConfig,
    ) -> Self {
        Self {
            adapters,
            swaps: DashMap::new(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            timelocks,
        }
    }

    /// Register a new swap for an accepted fill
    ///
    /// Timelocks are anchored to the source chain's clock. The destination
    /// timelock must expire strictly first so the source party always keeps
    /// more time to reclaim than the counter-party.
    pub async fn begin_swap(&self, spec: SwapSpec) -> ResolverResult<Uuid> {
        let src = self.adapters.get(spec.src_chain)?;
        // Both adapters must exist before any funds move
        self.adapters.get(spec.dst_chain)?;

        let now = src.current_time().await?;
        let timelock_src = now + self.timelocks.src_secs;
        let timelock_dst = now + self.timelocks.dst_secs;
        if timelock_dst >= timelock_src {
            return Err(ResolverError::Config(format!(
                "destination timelock {} must expire before source timelock {}",
                timelock_dst, timelock_src
            )));
        }

        let id = Uuid::new_v4();
        let swap = Swap {
            id,
            order_id: spec.order_id,
            resolver: spec.resolver,
            maker: spec.maker,
            amount: spec.amount,
            quote: spec.quote,
            hash_lock: spec.hash_lock,
            src_chain: spec.src_chain,
            dst_chain: spec.dst_chain,
            src_token: spec.src_token,
            dst_token: spec.dst_token,
            timelock_src,
            timelock_dst,
            state: SwapState::Created,
            src_escrow: None,
            dst_escrow: None,
            src_cancelled: false,
            dst_cancelled: false,
            created_at: now,
            updated_at: now,
        };

        self.swaps.insert(id, Arc::new(Mutex::new(swap)));
        crate::metrics::record_swap_state("created");
        info!(
            "Swap {} created for order {} ({} units, src timelock {}, dst timelock {})",
            id,
            hex::encode(spec.order_id),
            spec.amount,
            timelock_src,
            timelock_dst
        );
        Ok(id)
    }

    /// Drive a swap through the success path
    ///
    /// Transient submission failures retry with bounded exponential backoff;
    /// exhaustion before the reveal marks the swap `Failed` (funds remain
    /// recoverable through timelock expiry). Exhaustion after the reveal
    /// leaves the swap in `SecretRevealed` for the staleness alert: the
    /// secret is public and the claim can always be re-driven.
    pub async fn execute(&self, swap_id: Uuid, secret: &Secret) -> ResolverResult<()> {
        self.execute_until(swap_id, secret, SwapState::Claimed).await?;
        info!("Swap {} claimed on both chains", swap_id);
        Ok(())
    }

    /// Drive a swap forward until it reaches `target`, one transition at a
    /// time. The per-swap lock is released between transitions, so recovery
    /// and status reads interleave.
    pub async fn execute_until(
        &self,
        swap_id: Uuid,
        secret: &Secret,
        target: SwapState,
    ) -> ResolverResult<()> {
        let handle = self.swap_handle(&swap_id)?;

        {
            let swap = handle.lock().await;
            if keccak256(secret) != swap.hash_lock {
                return Err(ResolverError::InvalidSecret);
            }
        }

        loop {
            let state = {
                let swap = handle.lock().await;
                swap.state
            };
            if state == target {
                return Ok(());
            }

            match state {
                SwapState::Created => self.step_bid(&handle).await?,
                SwapState::Bid => self.step_source_escrow(&handle).await?,
                SwapState::SourceEscrowed => self.step_dest_escrow(&handle).await?,
                SwapState::DestEscrowed => self.step_reveal(&handle, secret).await?,
                SwapState::SecretRevealed => self.step_claim(&handle, secret).await?,
                other => {
                    return Err(ResolverError::InvalidTransition {
                        from: other.to_string(),
                        to: target.to_string(),
                    })
                }
            }
        }
    }

    /// Created -> Bid: submit the auction bid on the source chain
    async fn step_bid(&self, handle: &Arc<Mutex<Swap>>) -> ResolverResult<()> {
        let mut swap = handle.lock().await;
        self.expect_state(&swap, SwapState::Created, SwapState::Bid)?;

        let adapter = self.adapters.get(swap.src_chain)?;
        let (order_id, amount) = (swap.order_id, swap.amount);
        let submitted = self
            .with_retry(swap.src_chain, "submit_bid", || {
                let adapter = adapter.clone();
                async move { adapter.submit_bid(order_id, amount).await }
            })
            .await;

        match submitted {
            Ok(tx) => {
                debug!("Swap {} bid submitted: {}", swap.id, tx.tx_hash);
                self.transition(&mut swap, SwapState::Bid).await
            }
            Err(e) => self.fail_swap(&mut swap, e).await,
        }
    }

    /// Bid -> SourceEscrowed: lock the maker-facing escrow, wait for
    /// confirmation before advancing
    async fn step_source_escrow(&self, handle: &Arc<Mutex<Swap>>) -> ResolverResult<()> {
        let mut swap = handle.lock().await;
        self.expect_state(&swap, SwapState::Bid, SwapState::SourceEscrowed)?;

        let adapter = self.adapters.get(swap.src_chain)?;
        let params = EscrowParams {
            token: swap.src_token.clone(),
            recipient: swap.resolver.clone(),
            amount: swap.amount,
            hash_lock: swap.hash_lock,
            timelock: swap.timelock_src,
        };

        let created = self
            .with_retry(swap.src_chain, "create_escrow", || {
                let adapter = adapter.clone();
                let params = params.clone();
                async move { adapter.create_escrow(params).await }
            })
            .await;

        match created {
            Ok(escrow) => {
                debug!(
                    "Swap {} source escrow {} confirmed at height {}",
                    swap.id, escrow.escrow_id, escrow.confirmation_height
                );
                swap.src_escrow = Some(escrow);
                self.transition(&mut swap, SwapState::SourceEscrowed).await
            }
            Err(e) => self.fail_swap(&mut swap, e).await,
        }
    }

    /// SourceEscrowed -> DestEscrowed: mirror escrow on the destination
    /// chain; only reachable once the source escrow is confirmed
    async fn step_dest_escrow(&self, handle: &Arc<Mutex<Swap>>) -> ResolverResult<()> {
        let mut swap = handle.lock().await;
        self.expect_state(&swap, SwapState::SourceEscrowed, SwapState::DestEscrowed)?;
        if swap.src_escrow.is_none() {
            return Err(self.invalid_transition(&swap, SwapState::DestEscrowed));
        }

        let adapter = self.adapters.get(swap.dst_chain)?;
        let params = EscrowParams {
            token: swap.dst_token.clone(),
            recipient: swap.maker.clone(),
            amount: swap.quote,
            hash_lock: swap.hash_lock,
            timelock: swap.timelock_dst,
        };

        let created = self
            .with_retry(swap.dst_chain, "create_escrow", || {
                let adapter = adapter.clone();
                let params = params.clone();
                async move { adapter.create_escrow(params).await }
            })
            .await;

        match created {
            Ok(escrow) => {
                debug!(
                    "Swap {} destination escrow {} confirmed at height {}",
                    swap.id, escrow.escrow_id, escrow.confirmation_height
                );
                swap.dst_escrow = Some(escrow);
                self.transition(&mut swap, SwapState::DestEscrowed).await
            }
            Err(e) => self.fail_swap(&mut swap, e).await,
        }
    }

    /// DestEscrowed -> SecretRevealed: open the destination escrow. This is
    /// the commit point; from here both legs complete.
    async fn step_reveal(&self, handle: &Arc<Mutex<Swap>>, secret: &Secret) -> ResolverResult<()> {
        let mut swap = handle.lock().await;
        self.expect_state(&swap, SwapState::DestEscrowed, SwapState::SecretRevealed)?;

        let adapter = self.adapters.get(swap.dst_chain)?;
        let escrow = swap
            .dst_escrow
            .clone()
            .ok_or_else(|| self.invalid_transition(&swap, SwapState::SecretRevealed))?;

        let revealed = self
            .with_retry(swap.dst_chain, "reveal_secret", || {
                let adapter = adapter.clone();
                let escrow = escrow.clone();
                let secret = secret.clone();
                async move { adapter.reveal_secret(&escrow, &secret).await }
            })
            .await;

        match revealed {
            Ok(tx) => {
                debug!("Swap {} secret revealed: {}", swap.id, tx.tx_hash);
                self.transition(&mut swap, SwapState::SecretRevealed).await
            }
            Err(e) => self.fail_swap(&mut swap, e).await,
        }
    }

    /// SecretRevealed -> Claimed: claim the source escrow with the now-public
    /// secret
    async fn step_claim(&self, handle: &Arc<Mutex<Swap>>, secret: &Secret) -> ResolverResult<()> {
        let mut swap = handle.lock().await;
        self.expect_state(&swap, SwapState::SecretRevealed, SwapState::Claimed)?;

        let adapter = self.adapters.get(swap.src_chain)?;
        let escrow = swap
            .src_escrow
            .clone()
            .ok_or_else(|| self.invalid_transition(&swap, SwapState::Claimed))?;

        let claimed = self
            .with_retry(swap.src_chain, "claim", || {
                let adapter = adapter.clone();
                let escrow = escrow.clone();
                let secret = secret.clone();
                async move { adapter.claim(&escrow, &secret).await }
            })
            .await;

        match claimed {
            Ok(tx) => {
                debug!("Swap {} source leg claimed: {}", swap.id, tx.tx_hash);
                self.transition(&mut swap, SwapState::Claimed).await
            }
            Err(e) => {
                // Past the commit point the swap must not regress: surface
                // the failure, keep the state, and let staleness alerting
                // pick it up. The claim stays drivable forever.
                error!(
                    "Swap {} claim failed after retries, staying in {}: {}",
                    swap.id, swap.state, e
                );
                Err(ResolverError::SwapFailed {
                    swap_id: swap.id.to_string(),
                    reason: format!("source claim exhausted retries: {}", e),
                })
            }
        }
    }

    /// Attempt recovery of an expired swap. Returns `Ok(true)` once the swap
    /// is fully cancelled, `Ok(false)` when it is not eligible (terminal, or
    /// at/past the reveal), and `TimelockNotExpired` when invoked early.
    ///
    /// Escrows are reclaimed individually against their own chain's clock:
    /// the destination escrow after `timelock_dst`, the source escrow after
    /// `timelock_src`. The swap is `Cancelled` once nothing is left locked.
    pub async fn try_cancel(&self, swap_id: Uuid) -> ResolverResult<bool> {
        let handle = self.swap_handle(&swap_id)?;
        let mut swap = handle.lock().await;

        if swap.state.is_terminal() || swap.state.past_reveal() {
            return Ok(false);
        }

        let mut reclaimed = false;

        if let Some(escrow) = swap.dst_escrow.clone() {
            if !swap.dst_cancelled {
                let adapter = self.adapters.get(swap.dst_chain)?;
                let now = adapter.current_time().await?;
                if now > swap.timelock_dst {
                    self.with_retry(swap.dst_chain, "cancel", || {
                        let adapter = adapter.clone();
                        let escrow = escrow.clone();
                        async move { adapter.cancel(&escrow).await }
                    })
                    .await?;
                    swap.dst_cancelled = true;
                    reclaimed = true;
                    crate::metrics::record_escrow_cancelled(swap.dst_chain);
                    info!("Swap {} destination escrow reclaimed", swap.id);
                }
            }
        }

        if let Some(escrow) = swap.src_escrow.clone() {
            if !swap.src_cancelled {
                let adapter = self.adapters.get(swap.src_chain)?;
                let now = adapter.current_time().await?;
                if now > swap.timelock_src {
                    self.with_retry(swap.src_chain, "cancel", || {
                        let adapter = adapter.clone();
                        let escrow = escrow.clone();
                        async move { adapter.cancel(&escrow).await }
                    })
                    .await?;
                    swap.src_cancelled = true;
                    reclaimed = true;
                    crate::metrics::record_escrow_cancelled(swap.src_chain);
                    info!("Swap {} source escrow reclaimed", swap.id);
                }
            }
        }

        let src_clear = swap.src_escrow.is_none() || swap.src_cancelled;
        let dst_clear = swap.dst_escrow.is_none() || swap.dst_cancelled;

        if src_clear && dst_clear {
            if swap.src_escrow.is_none() && swap.dst_escrow.is_none() {
                // Nothing was ever locked; the source window still gates the
                // attempt so early recovery cannot release a live swap.
                let src = self.adapters.get(swap.src_chain)?;
                let now = src.current_time().await?;
                if now <= swap.timelock_src {
                    return Err(ResolverError::TimelockNotExpired {
                        swap_id: swap.id.to_string(),
                        timelock: swap.timelock_src,
                        now,
                    });
                }
            }
            self.transition(&mut swap, SwapState::Cancelled).await?;
            crate::metrics::record_swap_cancelled();
            return Ok(true);
        }

        if reclaimed {
            // Partial recovery: the remaining escrow's timelock has not
            // elapsed yet. The next supervisor pass finishes the job.
            return Ok(false);
        }

        let src = self.adapters.get(swap.src_chain)?;
        let now = src.current_time().await?;
        Err(ResolverError::TimelockNotExpired {
            swap_id: swap.id.to_string(),
            timelock: swap.governing_timelock(),
            now,
        })
    }

    /// Ids of swaps not yet in a terminal state
    pub async fn active_swaps(&self) -> Vec<Uuid> {
        let mut active = Vec::new();
        for entry in self.swaps.iter() {
            let swap = entry.value().lock().await;
            if !swap.state.is_terminal() {
                active.push(swap.id);
            }
        }
        active
    }

    /// Non-terminal swaps whose last transition is older than `threshold`
    /// on the source chain's clock
    pub async fn stale_swaps(&self, threshold_secs: u64) -> Vec<SwapView> {
        let mut stale = Vec::new();
        for entry in self.swaps.iter() {
            let swap = entry.value().lock().await;
            if swap.state.is_terminal() {
                continue;
            }
            let Ok(adapter) = self.adapters.get(swap.src_chain) else {
                continue;
            };
            let Ok(now) = adapter.current_time().await else {
                continue;
            };
            if now.saturating_sub(swap.updated_at) > threshold_secs {
                stale.push(Self::view(&swap));
            }
        }
        stale
    }

    /// Snapshot of every tracked swap for the status API
    pub async fn snapshot(&self) -> Vec<SwapView> {
        let mut views = Vec::new();
        for entry in self.swaps.iter() {
            let swap = entry.value().lock().await;
            views.push(Self::view(&swap));
        }
        views
    }

    /// Current state of one swap
    pub async fn swap_state(&self, swap_id: Uuid) -> ResolverResult<SwapState> {
        let handle = self.swap_handle(&swap_id)?;
        let swap = handle.lock().await;
        Ok(swap.state)
    }

    /// Drop terminal swaps from the table (archival)
    pub async fn prune_terminal(&self) -> usize {
        let mut terminal = Vec::new();
        for entry in self.swaps.iter() {
            let swap = entry.value().lock().await;
            if swap.state.is_terminal() {
                terminal.push(swap.id);
            }
        }
        for id in &terminal {
            self.swaps.remove(id);
        }
        terminal.len()
    }

    fn view(swap: &Swap) -> SwapView {
        SwapView {
            swap_id: swap.id,
            order_id: swap.order_id,
            resolver: swap.resolver.clone(),
            state: swap.state,
            amount: swap.amount,
            src_chain: swap.src_chain,
            dst_chain: swap.dst_chain,
            timelock_src: swap.timelock_src,
            timelock_dst: swap.timelock_dst,
            updated_at: swap.updated_at,
        }
    }

    fn swap_handle(&self, swap_id: &Uuid) -> ResolverResult<Arc<Mutex<Swap>>> {
        self.swaps
            .get(swap_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ResolverError::Internal(format!("swap {} not tracked", swap_id)))
    }

    fn expect_state(&self, swap: &Swap, expected: SwapState, target: SwapState) -> ResolverResult<()> {
        if swap.state != expected {
            return Err(self.invalid_transition(swap, target));
        }
        Ok(())
    }

    fn invalid_transition(&self, swap: &Swap, to: SwapState) -> ResolverError {
        ResolverError::InvalidTransition {
            from: swap.state.to_string(),
            to: to.to_string(),
        }
    }

    /// Apply a transition, stamping source-chain time. Violations are fatal
    /// to the swap instance and surfaced for operator intervention.
    async fn transition(&self, swap: &mut Swap, to: SwapState) -> ResolverResult<()> {
        if !swap.can_transition(to) {
            return Err(self.invalid_transition(swap, to));
        }
        let from = swap.state;
        swap.state = to;
        if let Ok(adapter) = self.adapters.get(swap.src_chain) {
            if let Ok(now) = adapter.current_time().await {
                swap.updated_at = now;
            }
        }
        crate::metrics::record_swap_state(to.name());
        info!("Swap {} transition {} -> {}", swap.id, from, to);
        Ok(())
    }

    /// Convert an exhausted submission into the terminal `Failed` state
    async fn fail_swap(&self, swap: &mut Swap, cause: ResolverError) -> ResolverResult<()> {
        let reason = cause.to_string();
        self.transition(swap, SwapState::Failed).await?;
        crate::metrics::record_swap_failed();
        error!("Swap {} failed: {}", swap.id, reason);
        Err(ResolverError::SwapFailed {
            swap_id: swap.id.to_string(),
            reason,
        })
    }

    /// Bounded exponential backoff around one adapter submission
    async fn with_retry<T, F, Fut>(
        &self,
        chain_id: ChainId,
        operation: &str,
        mut attempt_fn: F,
    ) -> ResolverResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ResolverResult<T>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < self.max_retries => {
                    warn!(
                        "{} on chain {} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation, chain_id, attempts, self.max_retries, delay, e
                    );
                    crate::metrics::record_submission_retry(chain_id);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_in(state: SwapState) -> Swap {
        Swap {
            id: Uuid::nil(),
            order_id: [0u8; 32],
            resolver: "r".to_string(),
            maker: "m".to_string(),
            amount: 1,
            quote: 1,
            hash_lock: [0u8; 32],
            src_chain: 1,
            dst_chain: 2,
            src_token: "t".to_string(),
            dst_token: "u".to_string(),
            timelock_src: 200,
            timelock_dst: 100,
            state,
            src_escrow: None,
            dst_escrow: None,
            src_cancelled: false,
            dst_cancelled: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_success_path_transitions() {
        use SwapState::*;
        let path = [Created, Bid, SourceEscrowed, DestEscrowed, SecretRevealed, Claimed];
        for window in path.windows(2) {
            assert!(swap_in(window[0]).can_transition(window[1]));
        }
    }

    #[test]
    fn test_no_skipping_states() {
        use SwapState::*;
        assert!(!swap_in(Created).can_transition(SourceEscrowed));
        assert!(!swap_in(Bid).can_transition(DestEscrowed));
        assert!(!swap_in(SourceEscrowed).can_transition(SecretRevealed));
        assert!(!swap_in(DestEscrowed).can_transition(Claimed));
    }

    #[test]
    fn test_cancellation_unreachable_past_reveal() {
        use SwapState::*;
        for state in [Created, Bid, SourceEscrowed, DestEscrowed] {
            assert!(swap_in(state).can_transition(Cancelled));
            assert!(swap_in(state).can_transition(Failed));
        }
        for state in [SecretRevealed, Claimed, Cancelled, Failed] {
            assert!(!swap_in(state).can_transition(Cancelled));
            assert!(!swap_in(state).can_transition(Failed));
        }
    }

    #[test]
    fn test_terminal_states_never_left() {
        use SwapState::*;
        let all = [
            Created, Bid, SourceEscrowed, DestEscrowed, SecretRevealed, Claimed, Cancelled, Failed,
        ];
        for terminal in [Claimed, Cancelled, Failed] {
            assert!(terminal.is_terminal());
            for target in all {
                assert!(!swap_in(terminal).can_transition(target));
            }
        }
    }

    #[test]
    fn test_governing_timelock_follows_outstanding_escrows() {
        let escrow = |chain_id| crate::chain::EscrowRef {
            chain_id,
            escrow_id: "e".to_string(),
            confirmation_height: 1,
        };

        // No escrows yet: the source window gates the attempt
        let swap = swap_in(SwapState::Bid);
        assert_eq!(swap.governing_timelock(), 200);

        // Source escrow outstanding
        let mut swap = swap_in(SwapState::SourceEscrowed);
        swap.src_escrow = Some(escrow(1));
        assert_eq!(swap.governing_timelock(), 200);

        // Source reclaimed, destination still locked
        let mut swap = swap_in(SwapState::DestEscrowed);
        swap.src_escrow = Some(escrow(1));
        swap.dst_escrow = Some(escrow(2));
        swap.src_cancelled = true;
        assert_eq!(swap.governing_timelock(), 100);
    }
}
