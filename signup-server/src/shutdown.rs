//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use crate::state::AppState;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Resolves on the first `kind` signal. Never resolves if the handler
/// cannot be installed.
async fn wait_for(kind: SignalKind, name: &'static str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Only the admin secret, the payments section and the server section
/// are swapped. The lock manager, the store and the notification
/// dispatcher keep the settings they were started with.
///
/// Returns a Notify that can be used to signal when shutdown is complete.
pub fn spawn_config_reload_handler(state: AppState, config_loader: Arc<ConfigLoader>) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, config reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            let server = &loaded_config.server;
                            if server.environment != state.locks.config().environment {
                                tracing::warn!(
                                    environment = %server.environment,
                                    "Environment change takes effect on restart"
                                );
                            }
                            *state.config.server.write().await = loaded_config.server;
                            *state.config.admin.write().await = loaded_config.admin;
                            *state.config.payments.write().await = loaded_config.payments;
                            tracing::info!("Configuration reloaded successfully");
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
