//! Matching engine - order book, fill bookkeeping and prioritization
//!
//! Fill acceptance is serialized per order: one exclusive critical section
//! per order id guards the remaining amount and the secret registry, so
//! racing resolvers observe a consistent snapshot. The lock covers only
//! in-memory bookkeeping and is never held across chain I/O; escrow work
//! happens afterwards under the swap coordinator's own sequencing.
//! Operations on different orders proceed fully in parallel.

use crate::auction::order::{Fill, Order};
use crate::chain::{OrderId, Secret};
use crate::commitment::{Hash32, MerkleProof, SecretRegistry};
use crate::error::{ResolverError, ResolverResult};

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Live order state, guarded by its per-order lock
struct OrderEntry {
    order: Order,
    /// Registration sequence, breaks prioritization ties deterministically
    seq: u64,
    filled: u128,
    fills: Vec<Fill>,
    registry: SecretRegistry,
}

/// Why an order left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArchiveReason {
    Filled,
    Expired,
}

/// Terminal order record kept for operator observability
#[derive(Clone, Serialize)]
pub struct ArchivedOrder {
    pub order: Order,
    pub filled: u128,
    pub fills: Vec<Fill>,
    pub secrets_used: usize,
    pub reason: ArchiveReason,
}

/// Result of an accepted fill
#[derive(Debug, Clone)]
pub struct FillReceipt {
    pub order_id: OrderId,
    pub resolver: String,
    pub amount: u128,
    /// New cumulative filled amount for the order
    pub cumulative: u128,
    /// Leaf digest consumed from the registry
    pub secret_digest: Hash32,
    /// Hash lock the fill's escrows are keyed to
    pub slice_lock: Hash32,
    pub fully_filled: bool,
}

/// Book-level view used for prioritization and the status API
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(serialize_with = "crate::auction::serialize_order_id")]
    pub order_id: OrderId,
    pub total_amount: u128,
    pub filled: u128,
    pub remaining: u128,
    pub secrets_used: usize,
    pub end_time: u64,
}

/// Owns all order, fill and secret state; no ambient globals
pub struct MatchingEngine {
    orders: DashMap<OrderId, Arc<Mutex<OrderEntry>>>,
    archive: DashMap<OrderId, ArchivedOrder>,
    next_seq: AtomicU64,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            archive: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a new order with zero filled amount and an empty registry
    pub fn add_order(&self, order: Order) -> ResolverResult<()> {
        order
            .validate()
            .map_err(ResolverError::InvalidOrder)?;

        let order_id = order.order_id;
        if self.archive.contains_key(&order_id) {
            return Err(ResolverError::DuplicateOrder {
                order_id: hex::encode(order_id),
            });
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Mutex::new(OrderEntry {
            order,
            seq,
            filled: 0,
            fills: Vec::new(),
            registry: SecretRegistry::new(),
        }));

        match self.orders.entry(order_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ResolverError::DuplicateOrder {
                order_id: hex::encode(order_id),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                crate::metrics::record_order_registered();
                info!("Registered order {}", hex::encode(order_id));
                Ok(())
            }
        }
    }

    /// Current Dutch-auction price for an order
    pub fn current_price(&self, order_id: &OrderId, now: u64) -> ResolverResult<u128> {
        let entry = self.live_entry(order_id)?;
        let guard = entry.lock().expect("order lock poisoned");
        Ok(guard.order.current_price(now))
    }

    /// Attempt to fill `amount` units of an order
    ///
    /// Checks run against a consistent snapshot inside the per-order critical
    /// section: remaining amount, commitment validation, then one-time secret
    /// use. On success the fill is recorded and the receipt carries the new
    /// cumulative amount.
    pub fn fill_order(
        &self,
        order_id: &OrderId,
        resolver: &str,
        amount: u128,
        secret: &Secret,
        proof: Option<&MerkleProof>,
        now: u64,
    ) -> ResolverResult<FillReceipt> {
        if amount == 0 {
            return Err(ResolverError::InvalidOrder(
                "fill amount must be greater than zero".to_string(),
            ));
        }

        let entry = self.live_entry(order_id)?;
        let receipt = {
            let mut guard = entry.lock().expect("order lock poisoned");

            let remaining = guard.order.total_amount - guard.filled;
            if amount > remaining {
                crate::metrics::record_fill_rejected("exceeds_total");
                return Err(ResolverError::FillExceedsTotal {
                    order_id: hex::encode(order_id),
                    requested: amount,
                    remaining,
                });
            }

            let digest = guard
                .order
                .commitment
                .authorize(secret, proof)
                .inspect_err(|_| crate::metrics::record_fill_rejected("invalid_secret"))?;

            guard
                .registry
                .consume(digest)
                .inspect_err(|_| crate::metrics::record_fill_rejected("secret_reused"))?;

            guard.filled += amount;
            guard.fills.push(Fill {
                resolver: resolver.to_string(),
                amount,
                secret_digest: digest,
                filled_at: now,
            });

            FillReceipt {
                order_id: *order_id,
                resolver: resolver.to_string(),
                amount,
                cumulative: guard.filled,
                secret_digest: digest,
                slice_lock: guard.order.commitment.slice_lock(digest),
                fully_filled: guard.filled == guard.order.total_amount,
            }
        };

        crate::metrics::record_fill_accepted();
        debug!(
            "Filled {} of order {} ({} cumulative)",
            amount,
            hex::encode(order_id),
            receipt.cumulative
        );

        if receipt.fully_filled {
            self.archive_order(order_id, ArchiveReason::Filled);
        }

        Ok(receipt)
    }

    /// Orders by descending remaining amount; ties break on earliest
    /// registration so the ordering is reproducible across runs
    pub fn prioritize_orders(&self) -> Vec<OrderSummary> {
        let mut ranked: Vec<(u64, OrderSummary)> = self
            .orders
            .iter()
            .map(|e| {
                let guard = e.value().lock().expect("order lock poisoned");
                (
                    guard.seq,
                    OrderSummary {
                        order_id: guard.order.order_id,
                        total_amount: guard.order.total_amount,
                        filled: guard.filled,
                        remaining: guard.order.total_amount - guard.filled,
                        secrets_used: guard.registry.len(),
                        end_time: guard.order.end_time,
                    },
                )
            })
            .collect();

        ranked.sort_by(|(seq_a, a), (seq_b, b)| {
            b.remaining.cmp(&a.remaining).then(seq_a.cmp(seq_b))
        });
        ranked.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Archive orders whose auction window closed more than `grace_secs` ago
    pub fn archive_expired(&self, now: u64, grace_secs: u64) -> usize {
        self.archive_where(|order| order.end_time.saturating_add(grace_secs) <= now)
    }

    /// Expiry sweep scoped to one source ledger's clock
    pub fn archive_expired_on(
        &self,
        chain_id: crate::chain::ChainId,
        now: u64,
        grace_secs: u64,
    ) -> usize {
        self.archive_where(|order| {
            order.src_chain == chain_id && order.end_time.saturating_add(grace_secs) <= now
        })
    }

    fn archive_where(&self, expired: impl Fn(&Order) -> bool) -> usize {
        let ids: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|e| {
                let guard = e.value().lock().expect("order lock poisoned");
                expired(&guard.order)
            })
            .map(|e| *e.key())
            .collect();

        for order_id in &ids {
            self.archive_order(order_id, ArchiveReason::Expired);
        }
        ids.len()
    }

    /// Clone an order out of the live book
    pub fn get_order(&self, order_id: &OrderId) -> ResolverResult<Order> {
        let entry = self.live_entry(order_id)?;
        let guard = entry.lock().expect("order lock poisoned");
        Ok(guard.order.clone())
    }

    /// Cumulative filled amount, live or archived
    pub fn filled_amount(&self, order_id: &OrderId) -> ResolverResult<u128> {
        if let Some(entry) = self.orders.get(order_id) {
            let guard = entry.lock().expect("order lock poisoned");
            return Ok(guard.filled);
        }
        self.archive
            .get(order_id)
            .map(|a| a.filled)
            .ok_or(ResolverError::OrderNotFound {
                order_id: hex::encode(order_id),
            })
    }

    /// Registered secret count, live or archived
    pub fn secrets_used(&self, order_id: &OrderId) -> ResolverResult<usize> {
        if let Some(entry) = self.orders.get(order_id) {
            let guard = entry.lock().expect("order lock poisoned");
            return Ok(guard.registry.len());
        }
        self.archive
            .get(order_id)
            .map(|a| a.secrets_used)
            .ok_or(ResolverError::OrderNotFound {
                order_id: hex::encode(order_id),
            })
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn archived_count(&self) -> usize {
        self.archive.len()
    }

    /// Snapshot of the live book for the status API
    pub fn summaries(&self) -> Vec<OrderSummary> {
        self.prioritize_orders()
    }

    fn live_entry(&self, order_id: &OrderId) -> ResolverResult<Arc<Mutex<OrderEntry>>> {
        self.orders
            .get(order_id)
            .map(|e| e.value().clone())
            .ok_or(ResolverError::OrderNotFound {
                order_id: hex::encode(order_id),
            })
    }

    fn archive_order(&self, order_id: &OrderId, reason: ArchiveReason) {
        if let Some((_, entry)) = self.orders.remove(order_id) {
            let guard = entry.lock().expect("order lock poisoned");
            self.archive.insert(
                *order_id,
                ArchivedOrder {
                    order: guard.order.clone(),
                    filled: guard.filled,
                    fills: guard.fills.clone(),
                    secrets_used: guard.registry.len(),
                    reason,
                },
            );
            crate::metrics::record_order_archived();
            info!(
                "Archived order {} ({:?}, {} filled)",
                hex::encode(order_id),
                reason,
                guard.filled
            );
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{keccak256, Commitment, MerkleTree};

    fn order_id(n: u8) -> OrderId {
        let mut id = [0u8; 32];
        id[0] = n;
        id
    }

    fn hash_lock_order(id: u8, total: u128, secret: &[u8]) -> Order {
        Order {
            order_id: order_id(id),
            src_chain: 1,
            dst_chain: 2,
            maker: "maker".to_string(),
            src_token: "0xtoken".to_string(),
            dst_token: "uatom".to_string(),
            start_time: 0,
            end_time: 100,
            start_price: 100,
            reserve_price: 10,
            total_amount: total,
            commitment: Commitment::HashLock(keccak256(secret)),
        }
    }

    #[test]
    fn test_duplicate_order_rejected() {
        let engine = MatchingEngine::new();
        engine.add_order(hash_lock_order(1, 100, b"s")).unwrap();
        assert!(matches!(
            engine.add_order(hash_lock_order(1, 100, b"s")),
            Err(ResolverError::DuplicateOrder { .. })
        ));
    }

    #[test]
    fn test_unknown_order() {
        let engine = MatchingEngine::new();
        assert!(matches!(
            engine.current_price(&order_id(9), 0),
            Err(ResolverError::OrderNotFound { .. })
        ));
        assert!(matches!(
            engine.fill_order(&order_id(9), "r", 1, &b"s".to_vec(), None, 0),
            Err(ResolverError::OrderNotFound { .. })
        ));
    }

    #[test]
    fn test_partial_fill_accounting() {
        // totalAmount=100: fill 60 succeeds, fill 50 fails, fill 40 completes
        let engine = MatchingEngine::new();
        let secrets: Vec<Vec<u8>> = (0..3).map(|i| vec![i as u8; 8]).collect();
        let tree = MerkleTree::from_secrets(&secrets).unwrap();
        let order = Order {
            commitment: Commitment::MerkleRoot(tree.root()),
            ..hash_lock_order(1, 100, b"unused")
        };
        engine.add_order(order).unwrap();
        let id = order_id(1);

        let p0 = tree.proof(0).unwrap();
        let receipt = engine
            .fill_order(&id, "alice", 60, &secrets[0], Some(&p0), 5)
            .unwrap();
        assert_eq!(receipt.cumulative, 60);
        assert!(!receipt.fully_filled);

        let p1 = tree.proof(1).unwrap();
        let err = engine
            .fill_order(&id, "bob", 50, &secrets[1], Some(&p1), 6)
            .unwrap_err();
        assert!(matches!(err, ResolverError::FillExceedsTotal { remaining: 40, .. }));

        let receipt = engine
            .fill_order(&id, "bob", 40, &secrets[1], Some(&p1), 7)
            .unwrap();
        assert_eq!(receipt.cumulative, 100);
        assert!(receipt.fully_filled);

        // Fully filled orders leave the book
        assert!(matches!(
            engine.fill_order(&id, "carol", 1, &secrets[2], None, 8),
            Err(ResolverError::OrderNotFound { .. })
        ));
        assert_eq!(engine.filled_amount(&id).unwrap(), 100);
        assert_eq!(engine.archived_count(), 1);
    }

    #[test]
    fn test_secret_reuse_and_cross_proof() {
        let engine = MatchingEngine::new();
        let secrets: Vec<Vec<u8>> = (0..3).map(|i| format!("s{}", i).into_bytes()).collect();
        let tree = MerkleTree::from_secrets(&secrets).unwrap();
        let order = Order {
            commitment: Commitment::MerkleRoot(tree.root()),
            ..hash_lock_order(2, 300, b"unused")
        };
        engine.add_order(order).unwrap();
        let id = order_id(2);

        let p0 = tree.proof(0).unwrap();
        engine
            .fill_order(&id, "alice", 10, &secrets[0], Some(&p0), 1)
            .unwrap();

        // Same secret again: rejected idempotently
        assert!(matches!(
            engine.fill_order(&id, "alice", 10, &secrets[0], Some(&p0), 2),
            Err(ResolverError::SecretAlreadyUsed)
        ));

        // s1's secret with s0's proof: commitment check fails first
        assert!(matches!(
            engine.fill_order(&id, "bob", 10, &secrets[1], Some(&p0), 3),
            Err(ResolverError::InvalidSecret)
        ));

        assert_eq!(engine.secrets_used(&id).unwrap(), 1);
        assert_eq!(engine.filled_amount(&id).unwrap(), 10);
    }

    #[test]
    fn test_single_lock_order_single_fill() {
        let engine = MatchingEngine::new();
        engine.add_order(hash_lock_order(3, 50, b"only")).unwrap();
        let id = order_id(3);

        assert!(matches!(
            engine.fill_order(&id, "r", 50, &b"wrong".to_vec(), None, 1),
            Err(ResolverError::InvalidSecret)
        ));

        let receipt = engine
            .fill_order(&id, "r", 50, &b"only".to_vec(), None, 1)
            .unwrap();
        assert_eq!(receipt.cumulative, 50);
        assert_eq!(receipt.slice_lock, keccak256(b"only"));
        assert!(receipt.fully_filled);
    }

    #[test]
    fn test_prioritization_deterministic() {
        let engine = MatchingEngine::new();
        engine.add_order(hash_lock_order(1, 100, b"a")).unwrap();
        engine.add_order(hash_lock_order(2, 300, b"b")).unwrap();
        engine.add_order(hash_lock_order(3, 300, b"c")).unwrap();

        let ranked = engine.prioritize_orders();
        let ids: Vec<OrderId> = ranked.iter().map(|s| s.order_id).collect();
        // Largest remaining first; equal remainders in registration order
        assert_eq!(ids, vec![order_id(2), order_id(3), order_id(1)]);
    }

    #[test]
    fn test_summaries_expose_hex_ids() {
        let engine = MatchingEngine::new();
        engine.add_order(hash_lock_order(0xab, 100, b"a")).unwrap();

        let summaries = engine.summaries();
        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert_eq!(json["order_id"], serde_json::json!(hex::encode(order_id(0xab))));
        assert_eq!(json["remaining"], serde_json::json!(100));
    }

    #[test]
    fn test_expired_orders_archived() {
        let engine = MatchingEngine::new();
        engine.add_order(hash_lock_order(1, 100, b"a")).unwrap();

        assert_eq!(engine.archive_expired(100, 60), 0);
        assert_eq!(engine.archive_expired(160, 60), 1);
        assert_eq!(engine.order_count(), 0);
        assert!(matches!(
            engine.current_price(&order_id(1), 200),
            Err(ResolverError::OrderNotFound { .. })
        ));
        // Observability survives archival
        assert_eq!(engine.filled_amount(&order_id(1)).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_fills_never_exceed_total() {
        use rand::Rng;
        use std::sync::Arc as StdArc;

        let engine = StdArc::new(MatchingEngine::new());
        let secrets: Vec<Vec<u8>> = (0..64).map(|i| format!("cs{}", i).into_bytes()).collect();
        let tree = MerkleTree::from_secrets(&secrets).unwrap();
        let order = Order {
            commitment: Commitment::MerkleRoot(tree.root()),
            ..hash_lock_order(7, 1_000, b"unused")
        };
        engine.add_order(order).unwrap();

        let mut handles = Vec::new();
        for (i, secret) in secrets.iter().cloned().enumerate() {
            let engine = engine.clone();
            let proof = tree.proof(i).unwrap();
            handles.push(std::thread::spawn(move || {
                let amount = rand::thread_rng().gen_range(1..=60u128);
                engine
                    .fill_order(&order_id(7), &format!("r{}", i), amount, &secret, Some(&proof), 1)
                    .map(|r| r.amount)
            }));
        }

        let mut accepted = 0u128;
        for handle in handles {
            if let Ok(amount) = handle.join().unwrap() {
                accepted += amount;
            }
        }

        assert!(accepted <= 1_000);
        let filled = engine
            .filled_amount(&order_id(7))
            .expect("order observable live or archived");
        assert_eq!(filled, accepted);
    }
}
