use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use procman_core::registry::ProcessRegistry;
use procman_db::{JobStore, SqliteJobStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procman_api::background;
use procman_api::config::ServerConfig;
use procman_api::render::PlainHtmlRenderer;
use procman_api::router::build_app_router;
use procman_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procman_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        base_url = %config.base_url,
        "Loaded server configuration"
    );

    // --- Job store ---
    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::open(&config.database_url)
            .await
            .expect("Failed to open job store"),
    );
    store
        .health_check()
        .await
        .expect("Job store health check failed");
    tracing::info!("Job store ready");

    // --- Processes ---
    let registry = Arc::new(ProcessRegistry::builtin());
    tracing::info!(processes = registry.len(), "Process registry built");

    // --- Job retention ---
    let retention_cancel = CancellationToken::new();
    let policy = config.retention_policy();
    let retention_handle = if policy.is_unbounded() {
        tracing::info!("Job retention disabled (no thresholds configured)");
        None
    } else {
        Some(tokio::spawn(background::job_retention::run(
            Arc::clone(&store),
            policy,
            config.retention_interval(),
            retention_cancel.clone(),
        )))
    };

    // --- App state ---
    let state = AppState::new(
        Arc::clone(&store),
        registry,
        Arc::new(PlainHtmlRenderer),
        &config,
    );
    let coordinator = Arc::clone(&state.coordinator);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    retention_cancel.cancel();
    if let Some(handle) = retention_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Job retention task stopped");
    }

    if coordinator.shutdown(config.shutdown_timeout()).await {
        tracing::info!("In-flight jobs finished");
    } else {
        tracing::warn!(
            abandoned = coordinator.in_flight(),
            "Shutdown timeout reached with jobs still running"
        );
    }

    store.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
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
