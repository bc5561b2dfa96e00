//! Exam Portal API server
//!
//! Environment (or matching `--flags`, see `--help`):
//!   JWT_SECRET     - token signing secret (required)
//!   JWT_EXPIRES_IN - token lifetime, e.g. 7d (default: 7d)
//!   DATABASE_URL   - SQLite path (default: examportal.db)
//!   HOST / PORT    - listen address (default: 0.0.0.0:5000)
//!   ADMIN_EMAIL / ADMIN_PASSWORD - optional bootstrap admin

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use examportal_backend::{
    auth::{user_store::ensure_admin, AuthState, JwtHandler, PasswordHasher, SqliteUserStore},
    create_router, AppConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = AppConfig::parse();

    info!("🚀 Exam Portal backend starting");

    let db_path = config.database_path();
    let user_store = Arc::new(SqliteUserStore::new(db_path)?);
    info!("📊 User database initialized at: {}", db_path);

    let jwt_handler = Arc::new(
        JwtHandler::new(&config.jwt_secret, config.jwt_expires_in)
            .context("Invalid token configuration")?,
    );
    let hasher = Arc::new(
        PasswordHasher::new(config.bcrypt_cost).context("Invalid password hasher configuration")?,
    );
    info!(
        "⏱️  Token lifetime: {}s, bcrypt cost: {}",
        jwt_handler.expires_in_secs(),
        hasher.cost()
    );

    if let Some((email, password)) = config.bootstrap_admin() {
        ensure_admin(
            user_store.as_ref(),
            &hasher,
            email,
            password,
            &config.admin_full_name,
        )
        .await?;
    }

    let auth_state = AuthState::new(user_store, jwt_handler, hasher);
    let app = create_router(auth_state);

    let addr = config.bind_addr().context("Invalid HOST/PORT")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

/// Initialize tracing with env-filter control
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "examportal_backend=debug,examportal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate's own .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
