//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Order ingestion and book churn
//! - Fill acceptance and rejection
//! - Swap state transitions and retries
//! - Recovery and staleness

use crate::error::ResolverResult;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Order ingestion metrics
    pub static ref ORDERS_RECEIVED: CounterVec = register_counter_vec!(
        "meridian_orders_received_total",
        "Orders delivered by the discovery feed, by source ledger",
        &["source"]
    ).unwrap();

    pub static ref ORDERS_DROPPED: CounterVec = register_counter_vec!(
        "meridian_orders_dropped_total",
        "Orders dropped because the ingestion channel was full",
        &["source"]
    ).unwrap();

    pub static ref ORDERS_DUPLICATE: CounterVec = register_counter_vec!(
        "meridian_orders_duplicate_total",
        "Replayed orders ignored by the engine",
        &["source"]
    ).unwrap();

    pub static ref ORDERS_REJECTED: CounterVec = register_counter_vec!(
        "meridian_orders_rejected_total",
        "Malformed or invalid orders discarded at ingestion",
        &["source"]
    ).unwrap();

    // Order book metrics
    pub static ref ORDERS_REGISTERED: IntCounter = register_int_counter!(
        "meridian_orders_registered_total",
        "Orders accepted into the book"
    ).unwrap();

    pub static ref ORDERS_ARCHIVED: IntCounter = register_int_counter!(
        "meridian_orders_archived_total",
        "Orders archived after full fill or expiry"
    ).unwrap();

    // Fill metrics
    pub static ref FILLS_ACCEPTED: IntCounter = register_int_counter!(
        "meridian_fills_accepted_total",
        "Fills accepted by the matching engine"
    ).unwrap();

    pub static ref FILLS_REJECTED: CounterVec = register_counter_vec!(
        "meridian_fills_rejected_total",
        "Fills rejected by the matching engine, by reason",
        &["reason"]
    ).unwrap();

    // Swap metrics
    pub static ref SWAP_STATES: CounterVec = register_counter_vec!(
        "meridian_swap_transitions_total",
        "Swap state transitions, by entered state",
        &["state"]
    ).unwrap();

    pub static ref SWAPS_FAILED: IntCounter = register_int_counter!(
        "meridian_swaps_failed_total",
        "Swaps that exhausted submission retries before the reveal"
    ).unwrap();

    pub static ref SWAPS_CANCELLED: IntCounter = register_int_counter!(
        "meridian_swaps_cancelled_total",
        "Swaps recovered after timelock expiry"
    ).unwrap();

    pub static ref SUBMISSION_RETRIES: CounterVec = register_counter_vec!(
        "meridian_submission_retries_total",
        "Adapter submission retries, by chain",
        &["chain_id"]
    ).unwrap();

    pub static ref ESCROWS_CANCELLED: CounterVec = register_counter_vec!(
        "meridian_escrows_cancelled_total",
        "Escrows reclaimed by recovery, by chain",
        &["chain_id"]
    ).unwrap();

    // Recovery metrics
    pub static ref RECOVERY_CANCELLATIONS: IntCounter = register_int_counter!(
        "meridian_recovery_cancellations_total",
        "Swaps cancelled across recovery passes"
    ).unwrap();

    pub static ref STALE_SWAPS: IntGauge = register_int_gauge!(
        "meridian_stale_swaps",
        "Non-terminal swaps past the staleness threshold"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> ResolverResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::ResolverError::Internal(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::ResolverError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_order_received(source: &str) {
    ORDERS_RECEIVED.with_label_values(&[source]).inc();
}

pub fn record_order_dropped(source: &str) {
    ORDERS_DROPPED.with_label_values(&[source]).inc();
}

pub fn record_order_duplicate(source: &str) {
    ORDERS_DUPLICATE.with_label_values(&[source]).inc();
}

pub fn record_order_rejected(source: &str) {
    ORDERS_REJECTED.with_label_values(&[source]).inc();
}

pub fn record_order_registered() {
    ORDERS_REGISTERED.inc();
}

pub fn record_order_archived() {
    ORDERS_ARCHIVED.inc();
}

pub fn record_fill_accepted() {
    FILLS_ACCEPTED.inc();
}

pub fn record_fill_rejected(reason: &str) {
    FILLS_REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_swap_state(state: &str) {
    SWAP_STATES.with_label_values(&[state]).inc();
}

pub fn record_swap_failed() {
    SWAPS_FAILED.inc();
}

pub fn record_swap_cancelled() {
    SWAPS_CANCELLED.inc();
}

pub fn record_submission_retry(chain_id: u64) {
    SUBMISSION_RETRIES
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_escrow_cancelled(chain_id: u64) {
    ESCROWS_CANCELLED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_recovery_pass(cancelled: usize) {
    RECOVERY_CANCELLATIONS.inc_by(cancelled as u64);
}

pub fn record_stale_swaps(count: usize) {
    STALE_SWAPS.set(count as i64);
}
