use std::net::SocketAddr;
use std::sync::Arc;

use credential_service::{
    build_router,
    config::CredentialConfig,
    services::{MongoStore, RedisSessionBackend, SecretCipher},
    AppState,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = CredentialConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting credential service"
    );

    let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    store.initialize_indexes().await?;
    tracing::info!("MongoDB initialized");

    let session_backend = RedisSessionBackend::new(&config.redis.url).await?;
    tracing::info!("Redis session backend initialized");

    let cipher = SecretCipher::from_base64(&config.encryption.key)?;

    let state = AppState::new(
        config.clone(),
        Arc::new(store),
        Arc::new(session_backend),
        cipher,
    );

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
