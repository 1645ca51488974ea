//! Voll.med API server
//!
//! Usage:
//!   vollmed serve
//!   vollmed add-account --login dr.silva --password '...'
//!
//! Environment:
//!   JWT_SECRET - HS256 signing key, at least 32 bytes (required)
//!   VOLLMED_CONFIG - TOML config path (default: vollmed.toml)
//!   BIND_ADDR, AUTH_DB_PATH, JWT_ISSUER, JWT_TTL_HOURS, BCRYPT_COST,
//!   AUTH_RECHECK_ACCOUNTS - config overrides

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vollmed_backend::{
    auth::{
        AuthState, Authenticator, CredentialStore, JwtHandler, PublicRoutes, RequestGate,
        SecretHasher, SecretKey, TokenConfig, UserStore,
    },
    build_router,
    config::Config,
};

const JWT_SECRET_VAR: &str = "JWT_SECRET";

#[derive(Parser, Debug)]
#[command(name = "vollmed")]
#[command(about = "Voll.med clinic API with stateless token authentication")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "VOLLMED_CONFIG", default_value = "vollmed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Register an account in the credential store
    AddAccount {
        #[arg(long)]
        login: String,

        #[arg(long, env = "VOLLMED_ACCOUNT_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let config = Config::from_file_and_env(&args.config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::AddAccount { login, password } => add_account(&config, &login, &password).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Voll.med API starting");

    // A bad key must stop us here, before any route is served.
    let secret = SecretKey::from_env(JWT_SECRET_VAR).map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?;
    let ttl = config.auth.token_ttl().map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?;
    let token_config = TokenConfig {
        secret,
        issuer: config.auth.issuer.clone(),
        ttl,
    };
    let jwt_handler = Arc::new(JwtHandler::new(token_config).map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?);

    let user_store: Arc<dyn CredentialStore> = Arc::new(UserStore::new(&config.auth.db_path)?);
    let hasher = SecretHasher::new(config.auth.bcrypt_cost);
    let authenticator = Arc::new(Authenticator::new(user_store.clone(), hasher)?);

    let mut gate = RequestGate::new(
        PublicRoutes::new(&config.auth.public_routes),
        jwt_handler.clone(),
    );
    if config.auth.recheck_accounts {
        gate = gate.with_account_check(user_store.clone());
    }

    info!(
        "Authentication initialized at: {} (issuer: {}, ttl: {}h, recheck accounts: {})",
        config.auth.db_path,
        jwt_handler.issuer(),
        jwt_handler.ttl().num_hours(),
        config.auth.recheck_accounts
    );

    let app = build_router(AuthState::new(authenticator, jwt_handler), Arc::new(gate));

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("API server listening on {}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn add_account(config: &Config, login: &str, password: &str) -> Result<()> {
    let store = UserStore::new(&config.auth.db_path)?;
    let hasher = SecretHasher::new(config.auth.bcrypt_cost);

    let password_hash = hasher.hash_blocking(password).await?;
    let account = store.create_account(login, password_hash)?;

    info!("Account {} stored in {}", account.login, config.auth.db_path);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vollmed_backend=debug,vollmed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root .env when run from elsewhere
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
