//! OAuth 2.0 authorization server
//!
//! Provides:
//! - Authorization code grant (`/authorize`, `/oauth/token`)
//! - Token revocation (`/oauth/revoke`)
//! - RFC 8414 OAuth metadata discovery
//! - Bearer token validation for forward auth (`/validate`)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use auth_server::{hash_secret, router, spawn_sweeper, AppState, Config};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "auth-server")]
#[command(about = "OAuth 2.0 authorization code server")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8888, env = "AUTH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "AUTH_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "./config", env = "AUTH_CONFIG_PATH")]
    config_path: String,

    /// Public URL for this service (used in OAuth metadata)
    #[arg(long, default_value = "http://localhost:8888", env = "AUTH_PUBLIC_URL")]
    public_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the hash to put in a client's `client_secret_hash`
    HashSecret {
        secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::HashSecret { secret }) = &cli.command {
        println!("{}", hash_secret(secret));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load(&cli.config_path)?;
    let state = Arc::new(AppState::from_config(
        &config,
        Path::new(&cli.config_path),
        cli.public_url.clone(),
    )?);

    let sweeper = spawn_sweeper(state.clone(), config.tokens.sweep_interval());
    let app = router(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    tracing::info!("Starting auth-server on {}", addr);
    tracing::info!("Public URL: {}", cli.public_url);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Auth server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
