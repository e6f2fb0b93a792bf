//! HTTP API server

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::{logout, require_auth, AuthGate, BcryptVerifier, MemoryHashStore, SessionRegistry};
use crate::config::Config;
use crate::decorators::{log_request, with_cors, with_generic_data, with_json_header};
use crate::error::Result;
use crate::shared::{with_shared_data, SharedDataStore};

use super::routes::{self, AppInfo};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
    pub shared: SharedDataStore,
}

impl AppState {
    /// Build the gate and the shared data store from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let hashes: MemoryHashStore = config.users.clone().into_iter().collect();
        if hashes.is_empty() {
            tracing::warn!("No users configured, every login will be rejected");
        }

        let registry = SessionRegistry::from_config(&config.auth);
        let gate = AuthGate::new(BcryptVerifier::new(hashes), registry, config.auth.settings());

        Ok(Self {
            gate,
            shared: SharedDataStore::with_shards(config.shared.shards),
        })
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let state = AppState::from_config(&config)?;

    let sweeper = match (config.auth.session_ttl(), config.auth.sweep_interval()) {
        (Some(_), Some(every)) => Some(state.gate.registry().spawn_sweeper(every)),
        _ => None,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    let result = serve(listener, app).await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result
}

/// Serve `app` on an already bound listener
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    // Layers run bottom-up: the gate first, then the scope, then the data put in it
    let protected = Router::new()
        .route("/api/secured", get(routes::secured))
        .route(
            "/api/whoami",
            get(routes::whoami).layer(from_fn(with_json_header)),
        )
        .layer(from_fn_with_state(AppInfo::current(), with_generic_data::<AppInfo>))
        .layer(from_fn_with_state(state.shared.clone(), with_shared_data))
        .layer(from_fn_with_state(state.gate.clone(), require_auth));

    let session = Router::new()
        .route("/api/logout", post(logout))
        .with_state(state.gate.clone());

    Router::new()
        .route("/api/health", get(routes::health))
        .merge(session)
        .merge(protected)
        // Middleware
        .layer(from_fn(with_cors))
        .layer(from_fn(log_request))
        .layer(TraceLayer::new_for_http())
}
