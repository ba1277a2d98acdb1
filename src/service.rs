//! Service wiring - builds the resolver from settings and injected chain
//! adapters, runs its background tasks, and owns graceful shutdown
//!
//! The embedding binary constructs one adapter per ledger, registers them,
//! and hands the order feed to its discovery layer. Everything else runs
//! here: ingestion, recovery, order expiry, the status API and metrics.

use crate::api;
use crate::auction::MatchingEngine;
use crate::chain::{AdapterRegistry, OrderId, Secret};
use crate::commitment::MerkleProof;
use crate::config::Settings;
use crate::error::{ResolverError, ResolverResult};
use crate::ingest::{OrderFeed, OrderIngestor};
use crate::metrics::MetricsServer;
use crate::swap::{RecoverySupervisor, SwapCoordinator, SwapSpec};

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct ResolverService {
    settings: Settings,
    adapters: Arc<AdapterRegistry>,
    engine: Arc<MatchingEngine>,
    coordinator: Arc<SwapCoordinator>,
    feed: OrderFeed,
    ingestor: Mutex<Option<OrderIngestor>>,
    shutdown: broadcast::Sender<()>,
}

impl ResolverService {
    pub fn new(settings: Settings, adapters: Arc<AdapterRegistry>) -> Self {
        let engine = Arc::new(MatchingEngine::new());
        let coordinator = Arc::new(SwapCoordinator::new(
            adapters.clone(),
            &settings.resolver,
            settings.timelocks.clone(),
        ));
        let (feed, ingestor) =
            OrderIngestor::new(engine.clone(), settings.resolver.order_channel_capacity);
        let (shutdown, _) = broadcast::channel(1);

        Self {
            settings,
            adapters,
            engine,
            coordinator,
            feed,
            ingestor: Mutex::new(Some(ingestor)),
            shutdown,
        }
    }

    /// Producer handle for the external order-discovery layer
    pub fn order_feed(&self) -> OrderFeed {
        self.feed.clone()
    }

    pub fn engine(&self) -> Arc<MatchingEngine> {
        self.engine.clone()
    }

    pub fn coordinator(&self) -> Arc<SwapCoordinator> {
        self.coordinator.clone()
    }

    /// Fill an order slice and drive the resulting swap to completion
    ///
    /// The fill must be authorized first - the engine's commitment and
    /// registry checks gate everything downstream. The agreed price is the
    /// Dutch-auction price at the source chain's current time.
    pub async fn fill_and_execute(
        &self,
        order_id: &OrderId,
        amount: u128,
        secret: &Secret,
        proof: Option<&MerkleProof>,
    ) -> ResolverResult<Uuid> {
        let order = self.engine.get_order(order_id)?;
        let src = self.adapters.get(order.src_chain)?;
        let now = src.current_time().await?;
        let price = order.current_price(now);

        let receipt = self.engine.fill_order(
            order_id,
            &self.settings.resolver.resolver_address,
            amount,
            secret,
            proof,
            now,
        )?;

        let quote = price
            .checked_mul(amount)
            .ok_or_else(|| ResolverError::Internal("fill quote overflows u128".to_string()))?;

        let spec = SwapSpec {
            order_id: *order_id,
            resolver: receipt.resolver.clone(),
            maker: order.maker.clone(),
            amount,
            quote,
            hash_lock: receipt.slice_lock,
            src_chain: order.src_chain,
            dst_chain: order.dst_chain,
            src_token: order.src_token.clone(),
            dst_token: order.dst_token.clone(),
        };

        let swap_id = self.coordinator.begin_swap(spec).await?;
        info!(
            "Fill accepted for order {} at price {} ({} units), driving swap {}",
            hex::encode(order_id),
            price,
            amount,
            swap_id
        );

        self.coordinator.execute(swap_id, secret).await?;
        Ok(swap_id)
    }

    /// Run all background tasks until `stop()` is called
    pub async fn run(&self) -> Result<()> {
        let mut handles = Vec::new();

        // Order ingestion
        let ingestor = self
            .ingestor
            .lock()
            .expect("ingestor slot poisoned")
            .take()
            .context("service already running")?;
        handles.push(tokio::spawn(ingestor.run(self.shutdown.subscribe())));

        // Recovery supervisor
        let supervisor =
            RecoverySupervisor::new(self.coordinator.clone(), &self.settings.resolver);
        let recovery_shutdown = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            supervisor.run(recovery_shutdown).await;
        }));

        // Order expiry sweep, one pass per recovery interval
        handles.push(tokio::spawn(expiry_sweep(
            self.engine.clone(),
            self.adapters.clone(),
            self.settings.resolver.recovery_interval_secs,
            self.settings.resolver.order_grace_secs,
            self.shutdown.subscribe(),
        )));

        // Status API
        let api_config = self.settings.api.clone();
        let api_engine = self.engine.clone();
        let api_coordinator = self.coordinator.clone();
        let api_adapters = self.adapters.clone();
        let instance_id = self.settings.resolver.instance_id.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = api::run_server(
                api_config,
                api_engine,
                api_coordinator,
                api_adapters,
                instance_id,
            )
            .await
            {
                error!("API server error: {}", e);
            }
        }));

        // Metrics server
        if self.settings.metrics.enabled {
            let server = MetricsServer::new(self.settings.metrics.port);
            handles.push(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!("Metrics server error: {}", e);
                }
            }));
        }

        info!(
            "Resolver {} running ({} chains connected)",
            self.settings.resolver.instance_id,
            self.adapters.connected_chains().len()
        );

        // Wait for shutdown, then let the loops drain
        let mut shutdown = self.shutdown.subscribe();
        let _ = shutdown.recv().await;
        info!("Shutdown signal received, stopping...");

        for handle in &handles {
            handle.abort();
        }
        let _ = futures::future::join_all(handles).await;

        info!("Resolver stopped");
        Ok(())
    }

    /// Signal every background task to stop
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Periodically archive orders whose auction window has lapsed, judged per
/// source ledger against that ledger's own clock
async fn expiry_sweep(
    engine: Arc<MatchingEngine>,
    adapters: Arc<AdapterRegistry>,
    interval_secs: u64,
    grace_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for chain_id in adapters.connected_chains() {
                    let Ok(adapter) = adapters.get(chain_id) else { continue };
                    match adapter.current_time().await {
                        Ok(now) => {
                            engine.archive_expired_on(chain_id, now, grace_secs);
                        }
                        Err(e) => warn!("Expiry sweep skipped chain {}: {}", chain_id, e),
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Initialize tracing with env-filter overrides
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meridian_resolver=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
