use crate::common::BoxedBody;
use crate::config::HandlerConfig;
use crate::drive::MemoryStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::info;

// Define the core Handler trait
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request<hyper::body::Incoming>) -> Result<Response<BoxedBody>>;
}

// Implement Handler for Arc<dyn Handler> so wrappers can hold the trait
// object directly.
#[async_trait]
impl Handler for Arc<dyn Handler> {
    async fn handle(&self, req: Request<hyper::body::Incoming>) -> Result<Response<BoxedBody>> {
        (**self).handle(req).await
    }
}

// Type alias for convenience
pub type SharedHandler = Arc<dyn Handler>;

pub mod compose;
pub mod gateway;
pub mod health;
pub mod range;
pub mod resolve;

// Re-export handler implementations
pub use self::gateway::DriveGatewayHandler;
pub use self::health::HealthCheckHandler;

/// Creates a concrete `Handler` instance based on the provided
/// configuration. Drive handlers get their store built and seeded here;
/// request handling never mutates it afterwards.
pub async fn create_handler(config: &HandlerConfig) -> Result<SharedHandler> {
    let handler: SharedHandler = match config {
        HandlerConfig::Drive(drive_cfg) => {
            let writable = drive_cfg.writable.unwrap_or(false);
            let store = MemoryStore::new(writable);

            if let Some(drives_root) = &drive_cfg.drives_root {
                let seeded = store.seed_from_dir(drives_root).await.with_context(|| {
                    format!("Seeding drives from '{}'", drives_root.display())
                })?;
                info!(
                    drives_root = %drives_root.display(),
                    drives = seeded,
                    writable,
                    "Creating DriveGatewayHandler"
                );
            } else {
                info!(writable, "Creating DriveGatewayHandler with empty store");
            }

            Arc::new(DriveGatewayHandler::new(Arc::new(store)))
        }

        HandlerConfig::HealthCheck(_) => Arc::new(HealthCheckHandler::new()),
    };

    Ok(handler)
}
