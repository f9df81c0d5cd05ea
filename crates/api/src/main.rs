use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use occlusmart_api::config::ServerConfig;
use occlusmart_api::router::build_app_router;
use occlusmart_api::state::AppState;
use occlusmart_core::analysis::BaselineComparisonAnalyzer;
use occlusmart_core::scan::ScanStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "occlusmart_api=debug,occlusmart_core=debug,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        max_image_bytes = config.max_image_bytes,
        max_image_pixels = config.max_image_pixels,
        max_stored_scans = config.max_stored_scans,
        "Loaded server configuration",
    );

    // --- Analyzer ---
    let analyzer = BaselineComparisonAnalyzer::new(config.analysis)
        .expect("Invalid analysis configuration");
    tracing::info!(
        thumbnail_size = analyzer.settings().thumbnail_size,
        change_threshold = analyzer.settings().change_threshold,
        "Baseline comparison analyzer ready",
    );

    // --- App state ---
    let scans = Arc::new(ScanStore::with_limit(config.max_stored_scans));
    let state = AppState {
        config: Arc::new(config.clone()),
        analyzer: Arc::new(analyzer),
        scans: Arc::clone(&scans),
    };

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

    // --- Shutdown wiring ---
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.changed().await;
        })
        .into_future();

    // In-flight requests get `shutdown_timeout_secs` to drain once the
    // signal arrives.
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let mut drain_rx = shutdown_rx;
    tokio::select! {
        result = server => result.expect("Server error"),
        () = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(drain).await;
        } => {
            tracing::warn!(?drain, "Shutdown drain timed out, dropping open connections");
        }
    }

    let scan_count = scans.count().await;
    tracing::info!(scan_count, "Graceful shutdown complete, in-memory scans discarded");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
