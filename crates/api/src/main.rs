use anyhow::Context;
use tracing::info;

use store_api::app::{build_app, build_services};
use store_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    store_observability::init(config.log_format);

    let services = build_services(&config)
        .await
        .context("failed to initialise the store")?;
    let backend = services.store.backend();
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %listener.local_addr()?, backend, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
