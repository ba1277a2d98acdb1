//! Chain module - the consumed ledger boundary
//!
//! This module provides:
//! - The `ChainAdapter` trait implemented once per ledger (Ethereum escrow
//!   factory, Cosmos HTLC module, ...)
//! - Opaque escrow handles and the confirmed-event feed
//! - The `AdapterRegistry` mapping chain ids to live adapters
//!
//! Adapters submit transactions and report confirmed on-chain events; the
//! core never talks to a ledger except through this boundary. Submissions
//! are idempotent from the caller's perspective: re-submitting an already
//! confirmed action is acknowledged as a no-op by the adapter.

use crate::error::{ResolverError, ResolverResult};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Ledger identifier (EVM chain id, or a registry id for non-EVM ledgers)
pub type ChainId = u64;

/// Order identifier, unique across the order feed
pub type OrderId = [u8; 32];

/// A secret preimage presented to open a hash lock
pub type Secret = Vec<u8>;

/// Reference to a submitted transaction on some ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub chain_id: ChainId,
    pub tx_hash: String,
}

/// Opaque handle to a confirmed on-chain escrow
///
/// Owned by exactly one swap; never shared across swaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRef {
    pub chain_id: ChainId,
    /// Chain-native escrow identifier (contract address or module id)
    pub escrow_id: String,
    /// Height at which the escrow creation was confirmed
    pub confirmation_height: u64,
}

/// Parameters for creating an HTLC escrow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowParams {
    pub token: String,
    pub recipient: String,
    pub amount: u128,
    pub hash_lock: [u8; 32],
    pub timelock: u64,
}

/// Confirmed events reported by a chain adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainEvent {
    /// A maker posted a new auction order
    NewOrder {
        chain_id: ChainId,
        order_id: OrderId,
        maker: String,
        amount: u128,
        commitment: crate::commitment::Commitment,
    },
    /// An escrow was created and confirmed
    EscrowCreated { escrow: EscrowRef },
    /// An escrow was claimed with a revealed secret
    EscrowClaimed { escrow: EscrowRef },
    /// An escrow was cancelled and refunded
    EscrowCancelled { escrow: EscrowRef },
}

impl ChainEvent {
    /// Get the chain ID for this event
    pub fn chain_id(&self) -> ChainId {
        match self {
            ChainEvent::NewOrder { chain_id, .. } => *chain_id,
            ChainEvent::EscrowCreated { escrow } => escrow.chain_id,
            ChainEvent::EscrowClaimed { escrow } => escrow.chain_id,
            ChainEvent::EscrowCancelled { escrow } => escrow.chain_id,
        }
    }

    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            ChainEvent::NewOrder { .. } => "new_order",
            ChainEvent::EscrowCreated { .. } => "escrow_created",
            ChainEvent::EscrowClaimed { .. } => "escrow_claimed",
            ChainEvent::EscrowCancelled { .. } => "escrow_cancelled",
        }
    }
}

/// One implementation per ledger. All calls are blocking I/O with network
/// latency; callers must not hold in-memory bookkeeping locks across them.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Ledger this adapter serves
    fn chain_id(&self) -> ChainId;

    /// Submit a bid against an auction order
    async fn submit_bid(&self, order_id: OrderId, amount: u128) -> ResolverResult<TxRef>;

    /// Create an HTLC escrow; returns once creation is confirmed on-chain
    async fn create_escrow(&self, params: EscrowParams) -> ResolverResult<EscrowRef>;

    /// Reveal the secret to claim an escrow on this ledger
    async fn reveal_secret(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef>;

    /// Claim an escrow using an already-public secret
    async fn claim(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef>;

    /// Cancel an expired escrow, reclaiming principal and safety deposit
    async fn cancel(&self, escrow: &EscrowRef) -> ResolverResult<TxRef>;

    /// Ledger-native time (timestamp or height). Timelock decisions use this,
    /// never the local wall clock.
    async fn current_time(&self) -> ResolverResult<u64>;

    /// Subscribe to confirmed events from this ledger
    fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent>;
}

/// Registry of live adapters, keyed by chain id
pub struct AdapterRegistry {
    adapters: DashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    /// Register an adapter; replaces any previous adapter for the chain
    pub fn register(&self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id(), adapter);
    }

    /// Get adapter for a specific chain
    pub fn get(&self, chain_id: ChainId) -> ResolverResult<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(&chain_id)
            .map(|a| a.clone())
            .ok_or(ResolverError::ChainNotFound { chain_id })
    }

    /// Get all connected chain IDs
    pub fn connected_chains(&self) -> Vec<ChainId> {
        self.adapters.iter().map(|e| *e.key()).collect()
    }

    /// Probe every adapter's clock as a readiness check
    pub async fn health_check(&self) -> Vec<(ChainId, bool)> {
        let adapters: Vec<(ChainId, Arc<dyn ChainAdapter>)> = self
            .adapters
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut results = Vec::new();
        for (chain_id, adapter) in adapters {
            let healthy = adapter.current_time().await.is_ok();
            results.push((chain_id, healthy));
        }
        results
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Adapter {}

        #[async_trait]
        impl ChainAdapter for Adapter {
            fn chain_id(&self) -> ChainId;
            async fn submit_bid(&self, order_id: OrderId, amount: u128) -> ResolverResult<TxRef>;
            async fn create_escrow(&self, params: EscrowParams) -> ResolverResult<EscrowRef>;
            async fn reveal_secret(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef>;
            async fn claim(&self, escrow: &EscrowRef, secret: &Secret) -> ResolverResult<TxRef>;
            async fn cancel(&self, escrow: &EscrowRef) -> ResolverResult<TxRef>;
            async fn current_time(&self) -> ResolverResult<u64>;
            fn subscribe_events(&self) -> broadcast::Receiver<ChainEvent>;
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_health() {
        let mut adapter = MockAdapter::new();
        adapter.expect_chain_id().return_const(7u64);
        adapter.expect_current_time().returning(|| Ok(1_234));

        let registry = AdapterRegistry::new();
        registry.register(Arc::new(adapter));

        assert!(registry.get(7).is_ok());
        assert!(matches!(
            registry.get(8),
            Err(ResolverError::ChainNotFound { chain_id: 8 })
        ));
        assert_eq!(registry.connected_chains(), vec![7]);
        assert_eq!(registry.health_check().await, vec![(7, true)]);
    }

    #[tokio::test]
    async fn test_unreachable_adapter_reports_unhealthy() {
        let mut adapter = MockAdapter::new();
        adapter.expect_chain_id().return_const(9u64);
        adapter.expect_current_time().returning(|| {
            Err(ResolverError::SubmissionFailed {
                chain_id: 9,
                message: "rpc down".to_string(),
            })
        });

        let registry = AdapterRegistry::new();
        registry.register(Arc::new(adapter));
        assert_eq!(registry.health_check().await, vec![(9, false)]);
    }
}
