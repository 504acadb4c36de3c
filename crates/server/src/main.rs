use anyhow::Result;
use axum::serve;
use keel_core::{
    config::AppConfig,
    metrics::MetricsCollector,
    proxy::{NetworkContext, NetworkRegistry},
    store,
};
use rustls::crypto::{ring::default_provider, CryptoProvider};
use server::{router, ws};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` takes precedence over `[logging].level`.
fn init_logging(config: &AppConfig) {
    let level = config.logging.level.as_str();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,keel_core={level},server={level},keel={level}")));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

/// Connects every configured network. A network that cannot be set up aborts startup.
async fn connect_networks(config: &AppConfig) -> Result<Vec<Arc<NetworkContext>>> {
    let store = store::connect(&config.storage.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Store initialization failed: {e}"))?;

    let mut contexts = Vec::with_capacity(config.networks.len());
    for network in &config.networks {
        let ctx = NetworkContext::connect(network, config, Arc::clone(&store)).await.map_err(|e| {
            error!(network = %network.name, error = %e, "network initialization failed");
            anyhow::anyhow!("Network {} failed to start: {e}", network.name)
        })?;
        contexts.push(ctx);
    }
    Ok(contexts)
}

#[tokio::main]
async fn main() -> Result<()> {
    CryptoProvider::install_default(default_provider())
        .map_err(|e| anyhow::anyhow!("Failed to install crypto provider: {e:?}"))?;

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration loading failed: {e}"))?;
    init_logging(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return Err(anyhow::anyhow!("Configuration validation failed: {e}"));
    }

    info!("Starting keel");
    debug!(
        networks = config.networks.len(),
        methods = config.methods.len(),
        http_port = config.server.http_port,
        ws_port = config.server.ws_port,
        "Configuration loaded"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let metrics = MetricsCollector::new();

    let contexts = connect_networks(&config).await?;
    let head_handles: Vec<_> =
        contexts.iter().map(|ctx| ctx.start(shutdown_tx.subscribe())).collect();

    let state = Arc::new(router::AppState::new(NetworkRegistry::new(contexts.clone()), metrics));
    let http_app = router::create_router(Arc::clone(&state), config.server.max_concurrent_requests);
    let ws_app = ws::create_ws_router(state);

    let http_addr = config.http_addr()?;
    let ws_addr = config.ws_addr()?;
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await?;
    info!(address = %http_addr, "RPC server listening");
    info!(address = %ws_addr, "WebSocket server listening");

    tokio::select! {
        result = serve(http_listener, http_app).with_graceful_shutdown(shutdown_signal()) => {
            if let Err(e) = result {
                error!(error = %e, "RPC server error occurred");
            }
        }
        result = serve(ws_listener, ws_app).with_graceful_shutdown(shutdown_signal()) => {
            if let Err(e) = result {
                error!(error = %e, "WebSocket server error occurred");
            }
        }
    }

    let _ = shutdown_tx.send(());
    for ctx in &contexts {
        ctx.shutdown();
    }
    for handle in head_handles {
        handle.abort();
    }
    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
