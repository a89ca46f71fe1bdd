//! API Server
//!
//! Runs the REST server for the volume engine.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::rest::RestRouter;
use crate::controlplane::VolumeEngine;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server with broadcast-driven graceful shutdown
pub struct ApiServer {
    config: ApiServerConfig,
    engine: Arc<VolumeEngine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, engine: Arc<VolumeEngine>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            engine,
            shutdown_tx,
        }
    }

    /// Run the API server until [`ApiServer::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        info!("Starting API server");
        info!("  REST API: {}", self.config.rest_addr);
        info!("  Cluster gateway: {}", self.engine.gateway_name());

        let rest_handle = self.spawn_rest_server();

        match rest_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("REST server task failed: {:?}", e);
                Err(Error::Internal(format!("REST server task failed: {}", e)))
            }
        }
    }

    /// Spawn the REST server
    fn spawn_rest_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let addr = self.config.rest_addr;
        let engine = self.engine.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move { run_rest_server(addr, engine, shutdown_rx).await })
    }

    /// Handle for triggering shutdown from another task
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

/// Run the REST API server
async fn run_rest_server(
    addr: SocketAddr,
    engine: Arc<VolumeEngine>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = RestRouter::new(engine.clone()).build();

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        Error::Internal(format!("Failed to bind REST server: {}", e))
    })?;

    info!("REST API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("REST server shutting down");
            engine.shutdown();
        })
        .await
        .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

    Ok(())
}
