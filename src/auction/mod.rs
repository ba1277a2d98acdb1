//! Dutch-auction order book and matching
//!
//! The matching engine owns all order, fill and secret state:
//! 1. Registers orders delivered by the ingestion feed
//! 2. Prices them under linear time decay
//! 3. Accepts whole or partial fills under per-order serialization
//! 4. Ranks open orders for resolver strategies

pub mod engine;
pub mod order;

pub use engine::{ArchiveReason, ArchivedOrder, FillReceipt, MatchingEngine, OrderSummary};
pub use order::{Fill, Order};

use serde::Serializer;

/// Hex-encode raw order ids in API payloads
pub(crate) fn serialize_order_id<S>(id: &crate::chain::OrderId, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&hex::encode(id))
}
