//! auth-server: OAuth 2.0 authorization code grant engine and its HTTP host.
//!
//! Core components (no HTTP):
//! - `registry` - Registered clients, secret checks, redirect allow-lists
//! - `codes` - Authorization code issue and single-use redemption
//! - `tokens` - Access token issuance and lookup
//! - `engine` - The two legs of the grant, wired from the above
//!
//! The `oauth` and `validation` modules expose the engine over axum.

pub mod clock;
pub mod codes;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod oauth;
pub mod params;
pub mod registry;
pub mod scope;
pub mod tokens;
pub mod validation;

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub use clock::{Clock, ManualClock, SystemClock};
pub use codes::{CodeStore, InMemoryCodes};
pub use config::Config;
pub use crypto::{hash_secret, OsRandom, SecretGenerator};
pub use engine::{AuthorizeRequest, GrantEngine, TokenRequest, TokenResponse};
pub use error::GrantError;
pub use registry::{Client, ClientRegistry, InMemoryClients};
pub use scope::Scope;
pub use tokens::{TokenIssuer, TokenStore};

/// Shared application state
pub struct AppState {
    pub engine: GrantEngine,
    pub public_url: String,
}

impl AppState {
    /// Wire the engine from configuration with the system clock and OS randomness
    pub fn from_config(config: &Config, config_path: &Path, public_url: String) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let random: Arc<dyn SecretGenerator> = Arc::new(OsRandom::new());

        let token_store = if config.tokens.persist_tokens {
            TokenStore::open(config_path, clock.now())?
        } else {
            TokenStore::in_memory()
        };

        let engine = GrantEngine::new(
            ClientRegistry::new(Arc::new(InMemoryClients::new(config.clients.clone()))),
            CodeStore::new(
                Arc::new(InMemoryCodes::new()),
                clock.clone(),
                random.clone(),
                config.tokens.code_lifetime(),
            ),
            TokenIssuer::new(
                Arc::new(token_store),
                clock,
                random,
                config.tokens.access_token_lifetime(),
            ),
        );

        Ok(Self { engine, public_url })
    }
}

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    with_layers(routes()).with_state(state)
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // OAuth metadata (RFC 8414)
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::metadata::handler),
        )
        // Authorization endpoint
        .route("/authorize", get(oauth::authorize::handler))
        // Token endpoint
        .route("/oauth/token", post(oauth::token::handler))
        // Revocation endpoint (RFC 7009)
        .route("/oauth/revoke", post(oauth::revoke::handler))
        // Validation endpoint for forward auth
        .route("/validate", get(validation::handler))
}

/// Middleware shared by every route; applies only to routes already added
fn with_layers(routes: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Turn a handler panic into an opaque `server_error`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    oauth::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &GrantError::Internal(detail),
    )
}

/// Periodically purge expired codes and tokens
pub fn spawn_sweeper(state: Arc<AppState>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match state.engine.sweep() {
                Ok(report) if report.codes > 0 || report.tokens > 0 => tracing::info!(
                    "Cleaned up {} expired codes and {} expired tokens",
                    report.codes,
                    report.tokens
                ),
                Ok(_) => {}
                Err(e) => tracing::error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
