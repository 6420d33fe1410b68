//! Fee-payer relay - sponsors EVM transactions on a Cosmos SDK ledger
//!
//! Accepts signed Ethereum transactions, wraps each in a ledger-native
//! envelope whose fee is paid and signed by the relay's own account, and
//! broadcasts them in strict sequence order from a single worker.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

mod api;
mod chain;
mod config;
mod error;
mod metrics;
mod proto;
mod relay;
mod tx;

use chain::RpcProvider;
use config::Settings;
use metrics::MetricsServer;
use relay::RelayWorker;
use tx::{EnvelopeBuilder, FeeEstimator, PayerIdentity};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting fee-payer relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({} RPC endpoints)",
        settings.chain.chain_id,
        settings.chain.rpc_urls.len()
    );

    // Payer identity; the relay cannot run without it
    let identity =
        PayerIdentity::from_env(&settings.payer.private_key_env, &settings.chain.bech32_prefix)?;
    let payer_address: Arc<str> = Arc::from(identity.bech32_address());
    info!(
        "Fee payer account: {} (0x{})",
        payer_address,
        hex::encode(identity.address())
    );

    // Node connection
    let provider = Arc::new(RpcProvider::new(settings.chain.clone())?);
    info!("Chain connection initialized");

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Request queue and worker
    let (fee_payer, requests) = relay::channel(settings.relay.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let estimator = FeeEstimator::new(
        provider.clone(),
        settings.relay.base_fee_lookahead_blocks,
        settings.relay.fee_policy,
    );
    let builder = EnvelopeBuilder::new(identity, settings.chain.chain_id.clone());
    let worker = RelayWorker::new(
        builder,
        estimator,
        provider.clone(),
        provider.clone(),
        requests,
        shutdown_rx,
    );

    let worker_handle = tokio::spawn(worker.run());

    // Start API server
    let api_handle = tokio::spawn({
        let state = api::AppState {
            fee_payer: fee_payer.clone(),
            fee_denom: Arc::from(settings.chain.evm_denom.as_str()),
            payer_address: payer_address.clone(),
            reply_timeout: Duration::from_secs(settings.relay.reply_timeout_secs),
        };
        let config = settings.api.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    info!("Fee-payer relay is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Stop the worker first so no envelope is half-handled
    drop(fee_payer);
    let grace = Duration::from_secs(settings.relay.shutdown_grace_secs);
    relay::stop(&shutdown_tx, worker_handle, grace).await;

    // Abort background tasks
    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Fee-payer relay stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,feepayer_relay=debug,hyper=warn"));

    let json = std::env::var("RELAY_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_current_span(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
