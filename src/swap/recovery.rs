//! Recovery supervisor - reclaims expired, unclaimed swaps
//!
//! Runs on a fixed interval. Every pass evaluates each non-terminal swap
//! against chain-reported time (never the local wall clock) and cancels the
//! legs whose timelocks have elapsed. Swaps at or past the secret reveal are
//! never touched. One swap's failure never blocks evaluation of the others,
//! and a transition in progress is waited out, not interrupted: cancellation
//! shares the swap's own mutex with the coordinator.

use crate::config::ResolverConfig;
use crate::error::ResolverError;
use crate::swap::coordinator::SwapCoordinator;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

pub struct RecoverySupervisor {
    coordinator: Arc<SwapCoordinator>,
    scan_interval: Duration,
    stale_after_secs: u64,
}

impl RecoverySupervisor {
    pub fn new(coordinator: Arc<SwapCoordinator>, config: &ResolverConfig) -> Self {
        Self {
            coordinator,
            scan_interval: Duration::from_secs(config.recovery_interval_secs.max(1)),
            stale_after_secs: config.stale_swap_secs,
        }
    }

    /// Supervisor loop; exits on shutdown signal
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.scan_interval);
        info!(
            "Recovery supervisor started (interval {:?}, staleness threshold {}s)",
            self.scan_interval, self.stale_after_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Recovery supervisor stopped");
                    break;
                }
            }
        }
    }

    /// One full scan over in-flight swaps. Public so tests can drive timeout
    /// boundaries deterministically against a controlled adapter clock.
    pub async fn run_once(&self) {
        let active = self.coordinator.active_swaps().await;
        let mut cancelled = 0usize;

        for swap_id in active {
            match self.coordinator.try_cancel(swap_id).await {
                Ok(true) => {
                    cancelled += 1;
                    info!("Recovered swap {} after timelock expiry", swap_id);
                }
                Ok(false) => {
                    // Not eligible: past reveal, terminal, or waiting on the
                    // remaining leg's timelock
                }
                Err(ResolverError::TimelockNotExpired { timelock, now, .. }) => {
                    debug!(
                        "Swap {} not yet recoverable (timelock {}, chain time {})",
                        swap_id, timelock, now
                    );
                }
                Err(e) => {
                    // Reported, never fatal to the scan
                    error!("Recovery attempt for swap {} failed: {}", swap_id, e);
                }
            }
        }

        let stale = self.coordinator.stale_swaps(self.stale_after_secs).await;
        crate::metrics::record_stale_swaps(stale.len());
        for view in &stale {
            warn!(
                "Swap {} stuck in {} for over {}s (order {}, resolver {})",
                view.swap_id,
                view.state,
                self.stale_after_secs,
                hex::encode(view.order_id),
                view.resolver
            );
        }

        if cancelled > 0 {
            crate::metrics::record_recovery_pass(cancelled);
        }
    }
}
