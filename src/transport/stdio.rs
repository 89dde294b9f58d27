//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::error::{DbError, DbResult};
use crate::mcp::VerticaService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport {
    service: VerticaService,
}

impl StdioTransport {
    pub fn new(service: VerticaService) -> Self {
        Self { service }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let running_service = self
            .service
            .clone()
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {e}")))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(reason) => info!(reason = ?reason, "Stdio transport completed"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.service.shutdown().await;
                        return Err(DbError::internal(format!("Stdio transport error: {e}")));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        self.service.shutdown().await;

        if shutdown_requested {
            // stdin reads block; the runtime cannot cancel them
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
