//! HTTP API for health checks, status, and monitoring
//!
//! Exposes the state operators watch: swap state per order and resolver,
//! filled amount per order, and registered-secret counts.

use crate::auction::MatchingEngine;
use crate::chain::AdapterRegistry;
use crate::config::ApiConfig;
use crate::error::ResolverResult;
use crate::swap::{SwapCoordinator, SwapView};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
    pub coordinator: Arc<SwapCoordinator>,
    pub adapters: Arc<AdapterRegistry>,
    pub instance_id: String,
    pub started_at: DateTime<Utc>,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    engine: Arc<MatchingEngine>,
    coordinator: Arc<SwapCoordinator>,
    adapters: Arc<AdapterRegistry>,
    instance_id: String,
) -> ResolverResult<()> {
    let state = AppState {
        engine,
        coordinator,
        adapters,
        instance_id,
        started_at: Utc::now(),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/orders", get(get_orders))
        .route("/swaps", get(get_swaps))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::error::ResolverError::Internal(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::ResolverError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify every chain adapter answers
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let chain_health = state.adapters.health_check().await;
    let chains_ok = !chain_health.is_empty() && chain_health.iter().all(|(_, healthy)| *healthy);

    let body = Json(ReadinessResponse {
        ready: chains_ok,
        details: chain_health
            .into_iter()
            .map(|(id, h)| ChainHealth {
                chain_id: id,
                healthy: h,
            })
            .collect(),
    });

    if chains_ok {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

/// Get resolver status
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let chain_health = state.adapters.health_check().await;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: state.instance_id.clone(),
        started_at: state.started_at,
        open_orders: state.engine.order_count(),
        archived_orders: state.engine.archived_count(),
        connected_chains: state.adapters.connected_chains(),
        chain_status: chain_health
            .into_iter()
            .map(|(id, h)| ChainHealth {
                chain_id: id,
                healthy: h,
            })
            .collect(),
    })
}

/// Order book snapshot: filled amounts and secret counts per order
async fn get_orders(State(state): State<AppState>) -> impl IntoResponse {
    Json(OrdersResponse {
        orders: state.engine.summaries(),
    })
}

/// Swap states per order and resolver
async fn get_swaps(State(state): State<AppState>) -> impl IntoResponse {
    Json(SwapsResponse {
        swaps: state.coordinator.snapshot().await,
    })
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    details: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct ChainHealth {
    chain_id: u64,
    healthy: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    instance_id: String,
    started_at: DateTime<Utc>,
    open_orders: usize,
    archived_orders: usize,
    connected_chains: Vec<u64>,
    chain_status: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct OrdersResponse {
    orders: Vec<crate::auction::OrderSummary>,
}

#[derive(Serialize)]
struct SwapsResponse {
    swaps: Vec<SwapView>,
}
