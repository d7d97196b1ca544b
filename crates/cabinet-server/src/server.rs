use std::sync::Arc;

use cabinet_core::Cabinet;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;
use crate::service::LocalService;

/// Cabinet server: one cabinet behind the HTTP API.
pub struct CabinetServer {
    config: ServerConfig,
    cabinet: Arc<Cabinet>,
}

impl CabinetServer {
    /// Build the cabinet and install the configured datasets. The cabinet
    /// is left closed until [`serve`](Self::serve) runs.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let cabinet = Cabinet::new(config.cabinet.clone())?;
        for definition in &config.datasets {
            cabinet.install(definition.clone())?;
        }
        Ok(Self {
            config,
            cabinet: Arc::new(cabinet),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn cabinet(&self) -> &Arc<Cabinet> {
        &self.cabinet
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let state = AppState {
            api: Arc::new(LocalService::new(Arc::clone(&self.cabinet))),
            stream_batch_rows: self.config.stream_batch_rows,
        };
        build_router(state, self.config.request_timeout())
    }

    /// Serve until Ctrl-C, then close the cabinet if it is still open.
    pub async fn serve(self) -> ServerResult<()> {
        if self.config.auto_open && !self.cabinet.is_open().await {
            let report = self.cabinet.open().await?;
            info!(restored = report.restored, skipped = report.skipped, "opened cabinet");
        }

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            "cabinet server listening on {} (cabinet {})",
            self.config.bind_addr,
            self.cabinet.id()
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        if self.cabinet.is_open().await {
            let report = self.cabinet.close().await?;
            info!(written = report.written, evicted = report.evicted, "closed cabinet on shutdown");
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
