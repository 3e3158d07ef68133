use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use kassa::api::{create_link_router, LinkAppState};
use kassa::config::{load_config, KassaConfig};
use kassa::credentials::CredentialStore;
use kassa::link::{run_attempt_cleanup, AttemptTracker};
use kassa::session::SessionRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kassa=info".into()),
        )
        .init();

    let config_path = std::env::args().nth(1);
    let config = match config_path.as_deref() {
        Some(path) => load_config(path)
            .map_err(|e| anyhow::anyhow!("failed to load config from {}: {}", path, e))?,
        None => KassaConfig::default(),
    };

    let master_key = std::env::var("KASSA_ENCRYPTION_KEY")
        .context("KASSA_ENCRYPTION_KEY must be set (base64, 32 bytes)")?;

    let store = Arc::new(
        CredentialStore::new(&config.database.path, &master_key)
            .context("failed to open credential store")?,
    );
    let registry = Arc::new(SessionRegistry::new(
        store,
        config.link.refresh_lead_seconds,
    ));

    // Discover accounts linked in previous runs.
    for record in registry.linked_accounts()? {
        info!(
            platform = %record.platform,
            account_id = record.account_id,
            "previously linked account"
        );
    }

    let attempts = AttemptTracker::new(config.link.attempt_expiry_seconds);
    tokio::spawn(run_attempt_cleanup(
        attempts.clone(),
        config.link.cleanup_interval_seconds,
    ));

    let app = create_link_router(LinkAppState {
        registry,
        attempts,
        http: reqwest::Client::new(),
    });

    let listener = tokio::net::TcpListener::bind(&config.api.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api.listen_addr))?;
    info!(addr = %config.api.listen_addr, "kassa listening");
    axum::serve(listener, app).await?;

    Ok(())
}
