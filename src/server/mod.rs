//! Collection and dashboard endpoints.
//!
//! - `POST /api/analytics/track` stores a batch or a single event
//! - `GET`/`POST /api/analytics` returns the dashboard overview; POST also
//!   records a snapshot
//! - `GET /api/analytics/test` checks that a property answers
//! - `GET /api/analytics/realtime` counts active users in the last 30 minutes
//! - `GET /api/analytics/history?clientId=` lists stored snapshots
//! - `GET`/`POST /api/clients` lists and registers clients
//!
//! Configure with `ZP_PORT`, `ZP_DEFAULT_PROPERTY_ID`, `ZP_CLIENTS_FILE`, and
//! `RUST_LOG` for log filtering.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod documents;
pub mod error;
pub mod routes;
pub mod state;

use config::ServerConfig;
use routes::{
    analytics_handler, analytics_snapshot_handler, analytics_test_handler,
    collect_handler, create_client_handler, history_handler, list_clients_handler,
    realtime_handler,
};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    // The tracker posts from the tracked sites' origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/analytics/track", post(collect_handler))
        .route(
            "/api/analytics",
            get(analytics_handler).post(analytics_snapshot_handler),
        )
        .route("/api/analytics/test", get(analytics_test_handler))
        .route("/api/analytics/realtime", get(realtime_handler))
        .route("/api/analytics/history", get(history_handler))
        .route(
            "/api/clients",
            get(list_clients_handler).post(create_client_handler),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), anyhow::Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = ServerConfig::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install signal handler: {e}");
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
