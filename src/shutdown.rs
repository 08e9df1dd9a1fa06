use futures::Future;
use std::{pin::Pin, time::Duration};
use tokio::{signal::ctrl_c, sync::watch, time::timeout};
use tracing::{error, info};

// Type alias for the pinned Ctrl+C future for cleaner signatures
type CtrlCFuture = Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send>>;

/// Sets up the shutdown signal handling.
///
/// Returns the watch sender used to broadcast shutdown, a cloneable
/// receiver for tasks, and a pinned future resolving on Ctrl+C.
pub fn setup_shutdown_signal() -> (watch::Sender<()>, watch::Receiver<()>, CtrlCFuture) {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let ctrl_c_fut = Box::pin(ctrl_c());
    (shutdown_tx, shutdown_rx, ctrl_c_fut)
}

/// Waits for Ctrl+C, broadcasts shutdown through the watch channel, then
/// joins the acceptor thread with a timeout. Connection tasks see the
/// same signal through their cloned receivers and wind down on their own.
pub async fn await_shutdown(
    shutdown_tx: watch::Sender<()>,
    ctrl_c_signal: CtrlCFuture,
    acceptor_handle: std::thread::JoinHandle<Result<(), anyhow::Error>>,
    shutdown_timeout: Duration,
) {
    info!("Server running. Press Ctrl+C to initiate graceful shutdown.");
    match ctrl_c_signal.await {
        Ok(()) => info!("Ctrl+C received. Initiating graceful shutdown..."),
        Err(e) => error!(
            "Failed listening for Ctrl+C: {}. Initiating shutdown anyway...",
            e
        ),
    }

    info!("Signaling acceptor thread and connection tasks to shut down...");
    if let Err(e) = shutdown_tx.send(()) {
        error!("Failed to send shutdown signal: {}", e);
    }
    drop(shutdown_tx);

    info!(
        "Waiting up to {:?} for acceptor thread to join...",
        shutdown_timeout
    );

    // JoinHandle::join is blocking, so push it onto the blocking pool.
    let join_acceptor = tokio::task::spawn_blocking(move || match acceptor_handle.join() {
        Ok(Ok(())) => info!("Acceptor thread joined gracefully."),
        Ok(Err(e)) => error!("Acceptor thread exited with error: {:?}", e),
        Err(panic_payload) => error!("Acceptor thread panicked: {:?}", panic_payload),
    });

    match timeout(shutdown_timeout, join_acceptor).await {
        Ok(_) => info!("Acceptor thread join completed within timeout."),
        Err(_) => error!(
            "Shutdown timed out after {:?} waiting for acceptor thread to join. It might be stuck.",
            shutdown_timeout
        ),
    }

    info!("Shutdown process complete.");
}
