//! Stream daemon: resolves media IDs, caches direct URLs and serves bytes.
//!
//! Configuration comes from the environment (see `CoreConfig::from_env`).

use anyhow::{Context, Result};
use core_runtime::{init_logging, CoreConfig};
use core_service::{api, bootstrap, CoreService};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = CoreConfig::from_env().context("loading configuration")?;
    init_logging(config.logging.clone()).context("initializing logging")?;

    let addr = config.bind_addr;
    let core = bootstrap(config).await.context("bootstrapping core service")?;
    let janitor = core.start_janitor();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(%addr, "Stream server listening");

    axum::serve(listener, api::router(core.clone()))
        .with_graceful_shutdown(shutdown_signal(core.clone()))
        .await
        .context("running stream server")?;

    core.shutdown();
    if let Some(handle) = janitor {
        if let Err(e) = handle.await {
            warn!(error = %e, "Janitor task ended abnormally");
        }
    }

    info!("Stream server stopped");
    Ok(())
}

async fn shutdown_signal(core: CoreService) {
    let token = core.shutdown_token();
    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                token.cancelled().await;
            }
        }
        _ = token.cancelled() => {}
    }
    info!("Shutdown requested");
    core.shutdown();
}
