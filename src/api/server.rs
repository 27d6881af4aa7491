//! API server implementation.
//!
//! HTTP REST server using Axum. Holds the one piece of shared state the
//! whole app needs: the sheet backend, the TTL cache in front of it, and
//! the live sessions.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{CredentialsFile, SessionStore};
use crate::cache::TtlCache;
use crate::config::OpsConfig;
use crate::schema::SheetTable;
use crate::sheets::SheetStore;

use super::handlers;

/// Bind address configuration.
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Mutable state behind one lock: every request is a full
/// load-work-respond cycle, matching the upstream sheet's
/// last-write-wins semantics.
pub struct SharedState {
    pub store: Box<dyn SheetStore + Send>,
    pub cache: TtlCache<SheetTable>,
    pub sessions: SessionStore,
}

/// Shared application state.
pub struct AppState {
    pub version: String,
    pub config: OpsConfig,
    pub credentials: CredentialsFile,
    pub inner: Mutex<SharedState>,
}

impl AppState {
    pub fn new(config: OpsConfig, credentials: CredentialsFile) -> anyhow::Result<Self> {
        let store = config.open_store()?;
        let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            credentials,
            inner: Mutex::new(SharedState {
                store,
                cache,
                sessions: SessionStore::new(),
            }),
        })
    }
}

/// Build the router. Split out so tests can drive it without binding.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Auth
        .route("/api/v1/login", post(handlers::login))
        .route("/api/v1/logout", post(handlers::logout))
        // Dashboard surface
        .route("/api/v1/overview", get(handlers::overview))
        .route("/api/v1/tasks", get(handlers::list_tasks).post(handlers::add_task))
        .route("/api/v1/tasks/update", post(handlers::update_task))
        .route("/api/v1/tasks/save", post(handlers::save_grid))
        .route("/api/v1/grid", get(handlers::grid))
        .route("/api/v1/archive", get(handlers::archive))
        .route("/api/v1/quarantine", get(handlers::quarantine))
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server.
pub async fn run_api_server(api: ApiConfig, config: OpsConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mfops_server=info,tower_http=info".into()),
        )
        .init();

    let credentials = CredentialsFile::load(&config.credentials_path)?;
    let state = Arc::new(AppState::new(config, credentials)?);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", api.host, api.port).parse()?;
    info!("MetaFlex Ops API starting on http://{}", addr);
    info!("   Endpoints: /api/v1/login, /api/v1/overview, /api/v1/tasks, /api/v1/tasks/save, /api/v1/archive");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("MetaFlex Ops API shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
        };
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().unwrap();
        assert_eq!(addr.port(), 3000);
    }
}
