//! Storefront Cart - per-session cart service

use std::sync::Arc;
use anyhow::Result;
use storefront_cart::{api, Config, SessionRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.storage_dir)?;

    let registry = Arc::new(SessionRegistry::new(config.registry()));
    registry.clone().start_eviction_task(config.eviction_interval);
    let app = api::router(registry);

    tracing::info!(storage_dir = %config.storage_dir.display(), "🔪 Storefront cart listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
