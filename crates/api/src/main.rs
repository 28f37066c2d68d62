use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use blocksnap_api::cache::MediaCache;
use blocksnap_api::config::ServerConfig;
use blocksnap_api::router::build_app_router;
use blocksnap_api::state::AppState;
use blocksnap_chain::alloy_client::AlloyChainClient;
use blocksnap_chain::config::ChainConfig;
use blocksnap_chain::inventory::Inventory;
use blocksnap_chain::resolver::TransactionResolver;
use blocksnap_chain::{ChainClient, ContractWriter};
use blocksnap_events::EventBus;
use blocksnap_ipfs::{ContentStore, IpfsClient, IpfsConfig};
use blocksnap_network::{DistributedNode, NodeConfig, RegistrationListener, TransactionVerifier};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blocksnap_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Chain ---
    let chain_config = ChainConfig::from_env();
    let alloy = Arc::new(
        AlloyChainClient::new(&chain_config).expect("Invalid blockchain configuration"),
    );
    if !alloy.can_sign() {
        tracing::warn!("PRIVATE_KEY not set, minting and session writes will fail");
    }
    tracing::info!(
        rpc_url = %chain_config.rpc_url,
        contract = %chain_config.contract_address,
        "Chain client ready"
    );
    let chain: Arc<dyn ChainClient> = alloy.clone();
    let writer: Arc<dyn ContractWriter> = alloy;

    // --- Background task cancellation ---
    let cancel = CancellationToken::new();

    // --- Content storage ---
    let ipfs_config = IpfsConfig::from_env();
    let gateway = ipfs_config.gateway_url.clone();
    let ipfs = IpfsClient::new(ipfs_config).expect("Failed to build IPFS client");
    match ipfs.wait_until_ready(&cancel).await {
        Some(Ok(_)) => {}
        Some(Err(e)) => {
            tracing::warn!(error = %e, "IPFS node not reachable, continuing without it");
        }
        None => tracing::warn!("IPFS readiness probe cancelled"),
    }
    let store: Arc<dyn ContentStore> = Arc::new(ipfs);

    let resolver = Arc::new(TransactionResolver::new(
        chain.clone(),
        chain_config.scan,
        gateway,
    ));
    let inventory = Arc::new(Inventory::new(chain.clone(), chain_config.scan));

    // --- Distributed node ---
    let verifier: Arc<dyn TransactionVerifier> = resolver.clone();
    let node = Arc::new(
        DistributedNode::new(NodeConfig::from_env(), Some(verifier))
            .await
            .expect("Failed to initialize distributed node"),
    );
    let node_handle = tokio::spawn(node.clone().run(cancel.clone()));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let listener_handle = tokio::spawn(RegistrationListener::run(
        node.clone(),
        event_bus.subscribe(),
    ));
    tracing::info!("Registration listener started");

    let cache = Arc::new(MediaCache::new(config.cache_dir.clone()));
    tracing::info!(cache_dir = %config.cache_dir.display(), "Media cache ready");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    let state = AppState {
        config: Arc::new(config.clone()),
        chain,
        writer,
        store,
        resolver,
        inventory,
        node,
        cache,
        event_bus: event_bus.clone(),
    };

    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting BlockSnap server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(shutdown_timeout, node_handle).await;
    tracing::info!("Discovery loop stopped");

    // Dropping the last sender closes the channel and ends the listener.
    drop(event_bus);
    let _ = tokio::time::timeout(shutdown_timeout, listener_handle).await;
    tracing::info!("Registration listener shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
