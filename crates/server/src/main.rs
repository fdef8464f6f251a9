//! Corral server binary.

use anyhow::{Context, Result};
use corral_core::config::AppConfig;
use corral_metadata::{MetadataStore, SqliteStore};
use corral_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Corral - commit reservation and availability reconciliation service
#[derive(Parser, Debug)]
#[command(name = "corrald")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "CORRAL_CONFIG",
        default_value = "config/corral.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Corral v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("CORRAL_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .sync
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid sync configuration")?;

    let metadata: Arc<dyn MetadataStore> = Arc::new(
        SqliteStore::new(&config.database.path)
            .await
            .context("failed to initialize metadata store")?,
    );
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!(path = %config.database.path.display(), "Metadata store initialized");

    let bind = config.server.bind.clone();
    let state = AppState::new(config, metadata);

    // Background sync loops
    state.scheduler.start(state.clone());

    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
