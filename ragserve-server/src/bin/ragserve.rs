//! ragserve server binary: load configuration, assemble the platform, serve
//! MCP over HTTP.

use anyhow::Context;
use ragserve_config::RagserveConfig;
use ragserve_server::{build_router, AppState, Platform, PlatformOptions};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = RagserveConfig::load(config_path.as_deref())
        .await
        .context("loading configuration")?;
    let bind = format!("{}:{}", config.server.bind_ip, config.server.port);

    let platform = Platform::build(PlatformOptions::new(config)).context("assembling platform")?;
    platform.seed().await.context("seeding templates")?;
    if let Some(api_key) = platform
        .bootstrap_admin("admin@ragserve.local")
        .await
        .context("bootstrapping admin")?
    {
        // Printed once on first run; only the salted hash is stored
        info!(api_key, "bootstrap uber_admin API key (store it now, it is not recoverable)");
    }

    let state = AppState {
        dispatcher: platform.dispatcher.clone(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(addr = %bind, "ragserve listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
