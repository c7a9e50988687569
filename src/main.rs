use std::sync::Arc;

use anyhow::{Context, Result};
use rtsp_gateway::config::{EndpointsConfig, Specification};
use rtsp_gateway::registry::Registry;
use rtsp_gateway::{build_router, shutdown, AppState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let spec = Specification::from_env().context("loading configuration")?;
    rtsp_gateway::logging::init(spec.debug);

    let endpoints = EndpointsConfig::load(&spec.endpoints_file)
        .await
        .context("loading endpoints file")?;

    let registry = Arc::new(Registry::new());
    for entry in &endpoints.listen {
        if entry.enabled {
            registry.seed_preload(entry.alias.clone(), entry.uri.clone());
        }
    }

    let cleanup_enabled = spec.cleanup_enabled;
    let cleanup_period = std::time::Duration::from_secs(spec.cleanup_period_secs);
    let port = spec.port;

    let state = AppState::new(spec, endpoints, registry.clone())?;

    if cleanup_enabled {
        let reaper_registry = registry.clone();
        tokio::spawn(async move {
            rtsp_gateway::reaper::run(reaper_registry, cleanup_period).await;
        });
    }

    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.context("binding listener")?;
    info!(%addr, "rtsp-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::drain(registry, shutdown::os_signal()))
        .await?;

    Ok(())
}
