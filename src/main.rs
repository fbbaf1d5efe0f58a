use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info, warn};

use blog_feed_api::{
    auth::HeaderIdentity,
    clock::SystemClock,
    config::{Config, StorageBackend},
    db::Database,
    middleware::{create_middleware_stack, init_tracing},
    routes::create_router,
    state::AppState,
    store::{MemoryStore, Store},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    let identity = match HeaderIdentity::new(&config.auth.user_header, store.clone()) {
        Ok(identity) => Arc::new(identity),
        Err(e) => {
            error!("Failed to configure identity provider: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(
        store,
        identity,
        Arc::new(SystemClock),
        &config.feed,
        &config.auth,
    );

    // Create the Axum router with all endpoints
    let app = create_router(state).layer(create_middleware_stack(config.request_timeout));

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start the server with graceful shutdown handling
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Connect to the configured backend and make sure its schema is in place
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match (config.storage, config.database.clone()) {
        (StorageBackend::Postgres, Some(database_config)) => {
            let database = Database::new(database_config).await?;
            info!("Database connection established");

            database.migrate().await?;

            Ok(Arc::new(database))
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("Postgres storage selected without database settings")
        }
        (StorageBackend::Memory, _) => {
            if config.environment.is_production() {
                warn!("In-memory storage in production: data is lost on restart");
            }
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
