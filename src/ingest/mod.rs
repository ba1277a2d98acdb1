//! Order ingestion - the boundary to the external discovery/relay layer
//!
//! The discovery layer watches each ledger for order-creation events and
//! delivers them here, one record per event, deduplicated by order id. Chain
//! payloads stay closed and tagged per ledger (`EthereumOrder`,
//! `CosmosOrder`) and are unified into one `Order` at the boundary.
//!
//! Delivery runs over a bounded channel: a full channel drops the record
//! with a metric and a warning, never silently. A closed channel is the
//! feed-interrupted signal; reconnection is the discovery layer's job.

use crate::auction::{MatchingEngine, Order};
use crate::chain::ChainId;
use crate::commitment::Commitment;
use crate::error::{ResolverError, ResolverResult};

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Order-creation payload from an EVM auction contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumOrder {
    pub chain_id: ChainId,
    pub dst_chain: ChainId,
    pub order_id: H256,
    pub maker: Address,
    /// Token escrowed by the maker on this chain
    pub src_token: Address,
    /// Destination-chain asset identifier
    pub dst_token: String,
    pub start_time: u64,
    pub end_time: u64,
    pub start_price: U256,
    pub reserve_price: U256,
    pub total_amount: U256,
    pub hash_lock: Option<H256>,
    pub merkle_root: Option<H256>,
}

/// Order-creation payload from a Cosmos HTLC module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosOrder {
    pub chain_id: ChainId,
    pub dst_chain: ChainId,
    /// Transaction hash of the creation message, hex
    pub order_id: String,
    pub maker: String,
    /// Denom locked by the maker on this chain
    pub src_token: String,
    /// Destination-chain asset identifier
    pub dst_token: String,
    pub start_time: u64,
    pub end_time: u64,
    pub start_price: u128,
    pub reserve_price: u128,
    pub total_amount: u128,
    /// Hex digest, exactly one of the two set
    pub hash_lock: Option<String>,
    pub merkle_root: Option<String>,
}

/// Closed, tagged order representation per source ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainOrder {
    Ethereum(EthereumOrder),
    Cosmos(CosmosOrder),
}

impl ChainOrder {
    pub fn chain_id(&self) -> ChainId {
        match self {
            ChainOrder::Ethereum(o) => o.chain_id,
            ChainOrder::Cosmos(o) => o.chain_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChainOrder::Ethereum(_) => "ethereum",
            ChainOrder::Cosmos(_) => "cosmos",
        }
    }

    /// Unify the payload into the core order model
    pub fn normalize(self) -> ResolverResult<Order> {
        match self {
            ChainOrder::Ethereum(o) => {
                let commitment = commitment_from(
                    o.hash_lock.map(|h| h.to_fixed_bytes()),
                    o.merkle_root.map(|h| h.to_fixed_bytes()),
                )?;
                Ok(Order {
                    order_id: o.order_id.to_fixed_bytes(),
                    src_chain: o.chain_id,
                    dst_chain: o.dst_chain,
                    maker: format!("{:?}", o.maker),
                    src_token: format!("{:?}", o.src_token),
                    dst_token: o.dst_token,
                    start_time: o.start_time,
                    end_time: o.end_time,
                    start_price: u256_amount(o.start_price, "start_price")?,
                    reserve_price: u256_amount(o.reserve_price, "reserve_price")?,
                    total_amount: u256_amount(o.total_amount, "total_amount")?,
                    commitment,
                })
            }
            ChainOrder::Cosmos(o) => {
                let commitment = commitment_from(
                    o.hash_lock.as_deref().map(parse_digest).transpose()?,
                    o.merkle_root.as_deref().map(parse_digest).transpose()?,
                )?;
                Ok(Order {
                    order_id: parse_digest(&o.order_id)?,
                    src_chain: o.chain_id,
                    dst_chain: o.dst_chain,
                    maker: o.maker,
                    src_token: o.src_token,
                    dst_token: o.dst_token,
                    start_time: o.start_time,
                    end_time: o.end_time,
                    start_price: o.start_price,
                    reserve_price: o.reserve_price,
                    total_amount: o.total_amount,
                    commitment,
                })
            }
        }
    }
}

fn commitment_from(
    hash_lock: Option<[u8; 32]>,
    merkle_root: Option<[u8; 32]>,
) -> ResolverResult<Commitment> {
    match (hash_lock, merkle_root) {
        (Some(lock), None) => Ok(Commitment::HashLock(lock)),
        (None, Some(root)) => Ok(Commitment::MerkleRoot(root)),
        (Some(_), Some(_)) => Err(ResolverError::InvalidOrder(
            "order carries both a hash lock and a merkle root".to_string(),
        )),
        (None, None) => Err(ResolverError::InvalidOrder(
            "order carries neither a hash lock nor a merkle root".to_string(),
        )),
    }
}

fn u256_amount(value: U256, field: &str) -> ResolverResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(ResolverError::InvalidOrder(format!(
            "{} does not fit in 128 bits",
            field
        )));
    }
    Ok(value.low_u128())
}

fn parse_digest(hex_str: &str) -> ResolverResult<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|e| ResolverError::InvalidOrder(format!("bad hex digest: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| ResolverError::InvalidOrder("digest must be 32 bytes".to_string()))
}

/// Producer handle given to the discovery layer
#[derive(Clone)]
pub struct OrderFeed {
    tx: mpsc::Sender<ChainOrder>,
}

impl OrderFeed {
    /// Deliver without blocking. A full channel drops the record with a
    /// metric; a closed channel signals the feed is shut down.
    pub fn deliver(&self, order: ChainOrder) -> bool {
        match self.tx.try_send(order) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(order)) => {
                crate::metrics::record_order_dropped(order.name());
                warn!(
                    "Order channel full, dropping {} order from chain {}",
                    order.name(),
                    order.chain_id()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Order channel closed, feed shut down");
                false
            }
        }
    }

    /// Deliver with backpressure, waiting for channel capacity
    pub async fn send(&self, order: ChainOrder) -> bool {
        self.tx.send(order).await.is_ok()
    }
}

/// Consumes the feed and registers orders with the matching engine
pub struct OrderIngestor {
    rx: mpsc::Receiver<ChainOrder>,
    engine: Arc<MatchingEngine>,
}

impl OrderIngestor {
    /// Build the bounded feed pair
    pub fn new(engine: Arc<MatchingEngine>, capacity: usize) -> (OrderFeed, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (OrderFeed { tx }, Self { rx, engine })
    }

    /// Ingestion loop; exits on shutdown or when the feed closes
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Order ingestor started");
        loop {
            tokio::select! {
                maybe_order = self.rx.recv() => {
                    match maybe_order {
                        Some(order) => self.ingest(order),
                        None => {
                            warn!("Order feed interrupted, ingestor exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Order ingestor stopped");
                    break;
                }
            }
        }
    }

    fn ingest(&self, payload: ChainOrder) {
        let source = payload.name();
        crate::metrics::record_order_received(source);

        let order = match payload.normalize() {
            Ok(order) => order,
            Err(e) => {
                warn!("Discarding malformed {} order: {}", source, e);
                crate::metrics::record_order_rejected(source);
                return;
            }
        };

        match self.engine.add_order(order) {
            Ok(()) => {}
            Err(ResolverError::DuplicateOrder { order_id }) => {
                // Relay replays are expected; the engine is the dedup point
                debug!("Duplicate order {} ignored", order_id);
                crate::metrics::record_order_duplicate(source);
            }
            Err(e) => {
                warn!("Failed to register {} order: {}", source, e);
                crate::metrics::record_order_rejected(source);
            }
        }
    }
}
