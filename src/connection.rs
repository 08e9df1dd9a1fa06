use crate::common::{full, should_ignore_hyper_error};
use crate::handlers::SharedHandler;
use hyper::header;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{error, info};

/// Handles a single accepted TCP connection: sets up the Hyper service
/// and serves it until the peer is done or shutdown is signaled.
/// Designed to be spawned in its own Tokio task.
pub async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    handler: SharedHandler, // Handler for business logic
    mut conn_shutdown_rx: watch::Receiver<()>, // Receiver for graceful shutdown
    server_name: String,    // Name of the server instance for logging
) {
    let io = TokioIo::new(stream);

    // --- Create the Hyper Service ---
    let server_name_for_service = server_name.clone();
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let handler_service_clone = Arc::clone(&handler);
        let server_name_for_async_block = server_name_for_service.clone();
        async move {
            let result = handler_service_clone.handle(req).await;
            let mut response = match result {
                Ok(resp) => resp,
                Err(e) => {
                    error!(server_name = %server_name_for_async_block, "Handler error: {:?}", e);
                    Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body(full("Internal Server Error"))
                        .unwrap()
                }
            };

            // Add the Server header
            response
                .headers_mut()
                .insert(header::SERVER, HeaderValue::from_static("Lantern"));

            Ok::<_, hyper::Error>(response)
        }
    });

    // --- Serve the Connection --- //
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn_fut = builder.serve_connection_with_upgrades(io, service);

    // --- Graceful Shutdown for the Connection --- //
    let shutdown_future = async {
        conn_shutdown_rx.changed().await.ok();
    };
    tokio::pin!(shutdown_future);

    let conn_result = tokio::select! {
        biased;
        _ = &mut shutdown_future => {
            info!(server_name = %server_name, remote = %remote_addr, "Graceful shutdown triggered for connection.");
            Ok(())
        },
        res = conn_fut => res,
    };

    // Log connection errors
    if let Err(err) = conn_result {
        if !should_ignore_hyper_error(err.as_ref()) {
            error!(server_name = %server_name, remote = %remote_addr, "Error serving connection: {:?}", err);
        }
    }
}
