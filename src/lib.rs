#![feature(io_error_more)]

pub mod cli;
pub mod common;
pub mod config;
pub mod connection;
pub mod drive;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod shutdown;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::LanternConfig;
use crate::server::prepare_listeners;
use std::thread;

use futures::future::{FutureExt, select_all};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

type AcceptFuture =
    Pin<Box<dyn Future<Output = Result<(TcpStream, SocketAddr), std::io::Error>> + Send>>;

// Owned accept future so the select_all vector holds no borrows of the
// listener contexts.
fn accept_on(listener: Arc<TcpListener>) -> AcceptFuture {
    Box::pin(async move { listener.accept().await })
}

/// Prepares listeners and starts the acceptor thread. Connection tasks
/// are spawned onto the calling runtime as connections arrive.
pub async fn start_services(
    config: &LanternConfig,
    shutdown_rx: watch::Receiver<()>,
) -> Result<thread::JoinHandle<Result<()>>> {
    // --- Prepare Listeners ---
    let listener_contexts = prepare_listeners(config, shutdown_rx.clone()).await?;

    // --- Get Main Runtime Handle ---
    let main_runtime_handle = tokio::runtime::Handle::current();

    // --- Spawn Acceptor Thread ---
    // Clone shutdown receiver for the acceptor thread itself
    let acceptor_shutdown_rx = shutdown_rx.clone();

    let acceptor_thread_handle = thread::Builder::new()
        .name("lantern-acceptor".into())
        .spawn(move || -> Result<()> {
            info!("Acceptor thread started.");

            // Dedicated current-thread runtime so accepts never compete
            // with request work on the main pool.
            let acceptor_runtime = tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
                .context("Failed to create acceptor runtime")?;

            acceptor_runtime.block_on(async move {
                info!("Acceptor loop running on dedicated runtime.");

                let listener_contexts = listener_contexts;

                // One pending accept future per listener; select_all picks
                // whichever fires first and tells us its index.
                let mut accept_futures: Vec<AcceptFuture> = listener_contexts
                    .iter()
                    .map(|ctx| accept_on(ctx.listener.clone()))
                    .collect();

                let mut acceptor_shutdown_rx = acceptor_shutdown_rx;

                // select_all panics on an empty set; with nothing bound
                // there is nothing to do but wait for shutdown.
                if accept_futures.is_empty() {
                    let _ = acceptor_shutdown_rx.changed().await;
                    info!("Acceptor loop (no listeners) received shutdown signal. Exiting.");
                    return Ok::<(), anyhow::Error>(());
                }

                loop {
                    let shutdown_future = acceptor_shutdown_rx.changed().fuse();

                    tokio::select! {
                        biased;

                        _ = shutdown_future => {
                            info!("Acceptor loop received shutdown signal. Exiting.");
                            break;
                        }

                        (result, index, _remaining) = select_all(accept_futures.iter_mut()) => {
                            let context = match listener_contexts.get(index) {
                                Some(ctx) => ctx,
                                None => {
                                    error!(listener_index = index, "BUG: Invalid index from select_all. Skipping.");
                                    accept_futures[index] = futures::future::pending().boxed();
                                    continue;
                                }
                            };

                            match result {
                                Ok((stream, remote_addr)) => {
                                    info!(
                                        server_name = %context.server_name,
                                        listener_index = index,
                                        remote_addr = %remote_addr,
                                        "Connection accepted. Handing off to main pool."
                                    );

                                    let handler = context.handler.clone();
                                    let server_name = context.server_name.clone();
                                    // Each connection needs its own receiver to react to shutdown.
                                    let conn_shutdown_rx = context.shutdown_rx.clone();

                                    main_runtime_handle.spawn(async move {
                                        crate::connection::handle_connection(
                                            stream,
                                            remote_addr,
                                            handler,
                                            conn_shutdown_rx,
                                            server_name,
                                        )
                                        .await;
                                    });

                                    // Re-arm the accept future for this listener.
                                    accept_futures[index] = accept_on(context.listener.clone());
                                }
                                Err(e) => {
                                    if crate::common::is_fd_exhaustion_error(&e) {
                                        error!(
                                            server_name = %context.server_name,
                                            error = %e,
                                            "File descriptor limit reached while accepting"
                                        );
                                    } else if !crate::common::is_transient_accept_error(&e) {
                                        error!(
                                            server_name = %context.server_name,
                                            listener_index = index,
                                            error = %e,
                                            "Error accepting connection"
                                        );
                                    }
                                    // Re-arm even after an error.
                                    accept_futures[index] = accept_on(context.listener.clone());
                                }
                            }
                        }
                    }
                }

                info!("Acceptor loop finished.");
                Ok::<(), anyhow::Error>(())
            })?;

            info!("Acceptor thread finished.");
            Ok(())
        })
        .context("Spawning acceptor thread failed")?;

    Ok(acceptor_thread_handle)
}

/// The main entry point for running the lantern server logic.
pub async fn run(config_path: &Path, config: LanternConfig) -> Result<()> {
    // --- Core Setup (Shutdown Signal Only) ---
    let (shutdown_tx, shutdown_rx, ctrl_c_signal) = shutdown::setup_shutdown_signal();

    // --- Start Services ---
    let acceptor_handle = match start_services(&config, shutdown_rx.clone()).await {
        Ok(acceptor_handle) => acceptor_handle,
        Err(e) => {
            error!("Failed to start services: {}", e);
            return Err(e.context("Service initialization failed"));
        }
    };

    // --- Log Readiness ---
    if !acceptor_handle.is_finished() {
        info!("Acceptor thread launched. Ready to accept connections.");
    } else {
        warn!("Acceptor thread finished unexpectedly soon after starting.");
    }

    // --- Wait for Shutdown ---
    let shutdown_timeout = Duration::from_secs(30);
    info!("Waiting for shutdown signal (Ctrl+C)...");
    shutdown::await_shutdown(shutdown_tx, ctrl_c_signal, acceptor_handle, shutdown_timeout).await;

    info!(
        "lantern server using {} has shut down gracefully.",
        config_path.display()
    );
    Ok(())
}

/// Top-level command dispatch: loads config where needed, initializes
/// logging, and runs the selected subcommand.
pub async fn ignite(cli_args: cli::Cli) -> Result<()> {
    // --- Determine command and config path early ---
    let command_to_run = cli_args.command.unwrap_or(cli::Commands::Run);
    let config_path = Path::new(&cli_args.config);

    // --- Load config only if needed (Validate/Run) ---
    // Note: create-config doesn't need to load an existing config
    let config: Option<LanternConfig> =
        if matches!(command_to_run, cli::Commands::Run | cli::Commands::Validate) {
            if config_path.exists() {
                match config::load_and_validate_config(config_path.to_str().unwrap()).await {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        return Err(e.context(format!(
                            "Config load/validation failed for '{}'",
                            config_path.display()
                        )));
                    }
                }
            } else if matches!(command_to_run, cli::Commands::Run) {
                bail!("Configuration file not found: {}", config_path.display());
            } else {
                // Validate command and config doesn't exist;
                // validate_config_cmd reports the missing file itself.
                None
            }
        } else {
            None
        };

    // --- Setup logging ---
    // Keep guards in scope until ignite finishes
    let _logging_guards = logging::setup_logging(config.as_ref().and_then(|c| c.logging.as_ref()))?;

    // Dispatch based on the command
    match command_to_run {
        cli::Commands::Run => {
            let loaded_config = config.expect("Config should be loaded for Run command");
            info!("🔦 Starting lantern using config: {}", config_path.display());
            run(config_path, loaded_config).await?;
            info!("🔦 lantern shut down gracefully.");
        }
        cli::Commands::Validate => {
            info!("Validating configuration file: {}", config_path.display());
            cli::validate_config_cmd(config_path, config).await?;
        }
        cli::Commands::CreateConfig { force } => {
            info!(
                "Attempting to create default config file: {}",
                config_path.display()
            );
            cli::create_default_config_cmd(config_path, force).await?;
        }
    }
    Ok(())
}
