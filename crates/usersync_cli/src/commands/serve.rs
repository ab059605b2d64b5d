//! Serve command implementation.

use super::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use usersync_core::SettingsHandle;
use usersync_server::{router, ServerConfig, SyncServer};

/// Runs the inbound HTTP server until interrupted.
///
/// Accounts applied from peers live in memory for the lifetime of the
/// process.
pub fn run(context: &Context, bind: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let settings = SettingsHandle::new(context.load_settings()?);
    let store = context.load_store()?;
    let config = ServerConfig::new(bind);
    let server = Arc::new(SyncServer::new(config, settings, store));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind).await?;
        tracing::info!(addr = %listener.local_addr()?, "sync server listening");

        let app = router(server).into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("sync server stopped");
        Ok::<(), std::io::Error>(())
    })?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
