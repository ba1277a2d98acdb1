//! Meridian Resolver - cross-chain Dutch-auction swap coordination
//!
//! A resolver watches decaying-price orders posted by makers, fills them in
//! whole or in verifiable partial slices, and coordinates a hash-time-locked
//! exchange so funds on two independent ledgers move atomically: either both
//! legs complete, or both are recoverable after a timeout.
//!
//! The crate is the off-chain core. Ledger access is injected through the
//! [`chain::ChainAdapter`] boundary (one implementation per ledger); order
//! discovery is injected through the bounded [`ingest::OrderFeed`]; durable
//! storage stays with the embedding deployment.

pub mod api;
pub mod auction;
pub mod chain;
pub mod commitment;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod service;
pub mod swap;

pub use auction::{FillReceipt, MatchingEngine, Order, OrderSummary};
pub use chain::{AdapterRegistry, ChainAdapter, ChainEvent, ChainId, EscrowRef, OrderId, Secret};
pub use commitment::{Commitment, MerkleProof, MerkleTree, SecretRegistry};
pub use config::Settings;
pub use error::{ResolverError, ResolverResult};
pub use ingest::{ChainOrder, CosmosOrder, EthereumOrder, OrderFeed, OrderIngestor};
pub use service::ResolverService;
pub use swap::{RecoverySupervisor, SwapCoordinator, SwapSpec, SwapState};
