// server.rs — Bind and serve the HTTP API until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::config::DaemonConfig;
use crate::handler::RequestHandler;
use crate::http::router;

pub async fn serve(config: DaemonConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;
    std::fs::create_dir_all(&config.work_root).with_context(|| {
        format!("cannot create work root {}", config.work_root.display())
    })?;

    for missing in config.missing_generators() {
        tracing::warn!(
            "generator {} not found in {}; it will be skipped on every request",
            missing.name,
            config.scripts_dir.display()
        );
    }
    let default_base = config.default_base_path();
    if !default_base.is_file() {
        tracing::warn!(
            "no default base file at {}; requests without an upload will fail",
            default_base.display()
        );
    }

    let bind = config.bind.clone();
    let handler = Arc::new(RequestHandler::new(config));
    let app = router(handler);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("cannot bind {}", bind))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
