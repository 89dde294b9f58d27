//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! Serves the MCP endpoint through rmcp's `StreamableHttpService` inside an
//! axum router. When bearer tokens are configured every request is
//! authenticated first.

use crate::auth::{BearerAuth, require_bearer};
use crate::error::{DbError, DbResult};
use crate::mcp::VerticaService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Time allowed for open streams to finish after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
pub struct HttpTransport {
    service: VerticaService,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
    auth: BearerAuth,
}

impl HttpTransport {
    pub fn new(
        service: VerticaService,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
        auth: BearerAuth,
    ) -> Self {
        Self {
            service,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
            auth,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the axum router serving the MCP endpoint.
    pub fn router(&self) -> axum::Router {
        let service = self.service.clone();
        let mcp = StreamableHttpService::new(
            move || Ok(service.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses a fallback
        let router = if self.endpoint == "/" {
            axum::Router::new().fallback_service(mcp)
        } else {
            axum::Router::new().nest_service(&self.endpoint, mcp)
        };

        if self.auth.is_enabled() {
            info!(tokens = self.auth.token_count(), "Bearer authentication enabled");
            router.layer(axum::middleware::from_fn_with_state(
                Arc::new(self.auth.clone()),
                require_bearer,
            ))
        } else {
            warn!("HTTP transport running without authentication");
            router
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!(addr = %bind_addr, "Starting MCP server with HTTP transport");

        let app = self.router();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {bind_addr}: {e}"),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let notify = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            notify.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // streaming responses can hold the server open; bound the wait
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.service.shutdown().await;
                        return Err(DbError::internal(format!("HTTP server error: {e}")));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)"
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        self.service.shutdown().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
