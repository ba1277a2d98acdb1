//! Simulated chain adapter for integration tests
//!
//! An in-memory ledger with a controllable clock and scriptable submission
//! failures, letting tests drive timelock boundaries deterministically.

use meridian_resolver::chain::{
    ChainAdapter, ChainEvent, ChainId, EscrowParams, EscrowRef, OrderId, Secret, TxRef,
};
use meridian_resolver::commitment::keccak256;
use meridian_resolver::config::{
    ApiConfig, ChainConfig, ChainKind, MetricsConfig, ResolverConfig, Settings, TimelockConfig,
};
use meridian_resolver::error::{ResolverError, ResolverResult};

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct SimEscrow {
    pub params: EscrowParams,
    pub claimed: bool,
    pub cancelled: bool,
}

/// In-memory ledger standing in for one chain
pub struct SimChain {
    chain_id: ChainId,
    clock: AtomicU64,
    height: AtomicU64,
    next_escrow: AtomicU64,
    escrows: DashMap<String, SimEscrow>,
    events: broadcast::Sender<ChainEvent>,
    /// Fail the next N bid/reveal/claim/cancel submissions
    fail_submissions: AtomicU32,
    /// Fail the next N escrow creations
    fail_escrows: AtomicU32,
}

impl SimChain {
    pub fn new(chain_id: ChainId, start_time: u64) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            chain_id,
            clock: AtomicU64::new(start_time),
            height: AtomicU64::new(100),
            next_escrow: AtomicU64::new(0),
            escrows: DashMap::new(),
            events,
            fail_submissions: AtomicU32::new(0),
            fail_escrows: AtomicU32::new(0),
        }
    }

    pub fn set_time(&self, now: u64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    pub fn fail_next_submissions(&self, count: u32) {
        self.fail_submissions.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_escrows(&self, count: u32) {
        self.fail_escrows.store(count, Ordering::SeqCst);
    }

    pub fn escrow_count(&self) -> usize {
        self.escrows.len()
    }

    pub fn escrow(&self, escrow_id: &str) -> Option<SimEscrow> {
        self.escrows.get(escrow_id).map(|e| e.value().clone())
    }

    fn take_failure(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn submission_gate(&self, operation: &str) -> ResolverResult<()> {
        if self.take_failure(&self.fail_submissions) {
            return Err(ResolverError::SubmissionFailed {
                chain_id: self.chain_id,
                message: format!("simulated {} outage", operation),
            });
        }
        Ok(())
    }

    fn tx_ref(&self, tag: &str) -> TxRef {
        TxRef {
            chain_id: self.chain_id,
            tx_hash: format!(
                "0x{}-{}-{}",
                tag,
                self.chain_id,
                self.height.fetch_add(1, Ordering::SeqCst)
            ),
        }
    }
}

#[async_trait]
impl ChainAdapter for SimChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn submit_bid(&self, _order_id: OrderId, _amount: u128) -> ResolverResult<TxRef> {
        self.submission_gate("bid")?;
        Ok(self.tx_ref("bid"))
    }

    async fn create_escrow(&self, params: EscrowParams) -> ResolverResult<EscrowRef> {
        if self.take_failure(&self.fail_escrows) {
            return Err(ResolverError::EscrowCreationFailed {
                chain_id: self.chain_id,
                message: "simulated escrow outage".to_string(),
            });
        }

        let escrow_id = format!(
            "escrow-{}-{}",
            self.chain_id,
            self.next_escrow.fetch_add(1, Ordering::SeqCst)
        );
        self.escrows.insert(
            escrow_id.clone(),
            SimEscrow {
                params,
                claimed: false,
                cancelled: false,
            },
        );

        let escrow = EscrowRef {
            chain_id: self.chain_id,
            escrow_id,
            confirmation_height: self.height.fetch_add(1, Ordering::SeqCst),
        };
        let _ = self.events.send(ChainEvent::EscrowCreated {
            escrow: escrow.clone(),
        });
        Ok(escrow)
    }

    async fn reveal_secret(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef> {
        self.submission_gate("reveal")?;
        let mut entry =
            self.escrows
                .get_mut(&escrow.escrow_id)
                .ok_or(ResolverError::SubmissionFailed {
                    chain_id: self.chain_id,
                    message: "unknown escrow".to_string(),
                })?;

        if entry.claimed {
            // Idempotent acknowledgement of an already-confirmed claim
            return Ok(self.tx_ref("reveal"));
        }
        if keccak256(secret) != entry.params.hash_lock {
            return Err(ResolverError::SubmissionFailed {
                chain_id: self.chain_id,
                message: "secret does not open the hash lock".to_string(),
            });
        }
        if self.clock.load(Ordering::SeqCst) > entry.params.timelock {
            return Err(ResolverError::SubmissionFailed {
                chain_id: self.chain_id,
                message: "escrow past its timelock".to_string(),
            });
        }

        entry.claimed = true;
        let _ = self.events.send(ChainEvent::EscrowClaimed {
            escrow: escrow.clone(),
        });
        Ok(self.tx_ref("reveal"))
    }

    async fn claim(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef> {
        self.reveal_secret(escrow, secret).await
    }

    async fn cancel(&self, escrow: &EscrowRef) -> ResolverResult<TxRef> {
        self.submission_gate("cancel")?;
        let mut entry =
            self.escrows
                .get_mut(&escrow.escrow_id)
                .ok_or(ResolverError::SubmissionFailed {
                    chain_id: self.chain_id,
                    message: "unknown escrow".to_string(),
                })?;

        if entry.cancelled {
            return Ok(self.tx_ref("cancel"));
        }
        if entry.claimed {
            return Err(ResolverError::SubmissionFailed {
                chain_id: self.chain_id,
                message: "escrow already claimed".to_string(),
            });
        }
        if self.clock.load(Ordering::SeqCst) <= entry.params.timelock {
            return Err(ResolverError::SubmissionFailed {
                chain_id: self.chain_id,
                message: "timelock not yet reached".to_string(),
            });
        }

        entry.cancelled = true;
        let _ = self.events.send(ChainEvent::EscrowCancelled {
            escrow: escrow.clone(),
        });
        Ok(self.tx_ref("cancel"))
    }

    async fn current_time(&self) -> ResolverResult<u64> {
        Ok(self.clock.load(Ordering::SeqCst))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }
}

/// Settings tuned for fast, deterministic tests
pub fn test_settings(src_secs: u64, dst_secs: u64) -> Settings {
    let mut chains = HashMap::new();
    chains.insert(
        "source".to_string(),
        ChainConfig {
            chain_id: 1,
            name: "source".to_string(),
            kind: ChainKind::Ethereum,
            enabled: true,
        },
    );
    chains.insert(
        "destination".to_string(),
        ChainConfig {
            chain_id: 2,
            name: "destination".to_string(),
            kind: ChainKind::Cosmos,
            enabled: true,
        },
    );

    Settings {
        resolver: ResolverConfig {
            instance_id: "test-resolver".to_string(),
            resolver_address: "0xresolver".to_string(),
            max_retries: 3,
            retry_delay_ms: 1,
            order_channel_capacity: 16,
            recovery_interval_secs: 1,
            stale_swap_secs: 600,
            order_grace_secs: 60,
        },
        timelocks: TimelockConfig { src_secs, dst_secs },
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 0,
        },
        chains,
    }
}
