// Encapsulates listener preparation: binds all configured TCP listeners
// and pairs each with its handler, without accepting connections yet.

use anyhow::{Result, bail};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    config::LanternConfig,
    handlers::{SharedHandler, create_handler},
};

type ShutdownRx = tokio::sync::watch::Receiver<()>;

/// Holds a bound listener and all necessary context to handle its connections.
/// The listener is shared so the acceptor loop can hold owned accept futures.
pub struct ListenerContext {
    pub server_name: String,
    pub listener: Arc<TcpListener>,
    pub handler: SharedHandler,
    pub shutdown_rx: ShutdownRx,
}

/// Prepares listeners and their context based on the configuration.
/// A server whose handler or bind fails is skipped with a warning; the
/// call only fails when every configured server failed.
pub async fn prepare_listeners(
    config: &LanternConfig,
    shutdown_rx: ShutdownRx,
) -> Result<Vec<ListenerContext>> {
    let mut listener_contexts = Vec::new();

    for (server_name, server_config) in &config.server {
        info!(server_name = %server_name, "Preparing server configuration...");

        // 1. Build the handler (seeds drive stores, so it can fail on IO)
        let handler = match create_handler(&server_config.handler).await {
            Ok(handler) => handler,
            Err(e) => {
                warn!(server_name = %server_name, error = %e, "Skipping server due to handler preparation error");
                continue;
            }
        };

        // 2. Bind the listener
        let listener = match TcpListener::bind(server_config.listen_addr).await {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    server_name = %server_name,
                    addr = %server_config.listen_addr,
                    error = %e,
                    "Failed to bind listener; skipping server"
                );
                continue;
            }
        };
        let server_addr = listener.local_addr()?;
        info!(server_name = %server_name, "HTTP listener bound to {}", server_addr);

        // 3. Create and store context
        listener_contexts.push(ListenerContext {
            server_name: server_name.clone(),
            listener: Arc::new(listener),
            handler,
            shutdown_rx: shutdown_rx.clone(),
        });
    }

    if listener_contexts.is_empty() && config.server.is_empty() {
        info!("No servers configured.");
    } else if listener_contexts.is_empty() && !config.server.is_empty() {
        bail!("All configured servers failed to prepare. See previous warnings.");
    }

    Ok(listener_contexts)
}
