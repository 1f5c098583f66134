//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to shutdown or reload
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - A reload goes through the same load + validate path as the file watcher

use std::path::Path;

use tokio::sync::mpsc;

use crate::config::watcher::reload_into;
use crate::config::ProxyConfig;
use crate::lifecycle::shutdown::Shutdown;

/// Handle signals until SIGINT or SIGTERM, then trigger `shutdown`.
#[cfg(unix)]
pub async fn run_signal_loop(
    shutdown: &Shutdown,
    config_path: &Path,
    config_tx: &mpsc::UnboundedSender<ProxyConfig>,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT");
                break;
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM");
                break;
            }
            _ = hangup.recv() => {
                tracing::info!(path = %config_path.display(), "Received SIGHUP, reloading configuration");
                reload_into(config_path, config_tx);
            }
        }
    }

    shutdown.trigger();
    Ok(())
}

/// Handle Ctrl+C, then trigger `shutdown`. No reload signal exists here.
#[cfg(not(unix))]
pub async fn run_signal_loop(
    shutdown: &Shutdown,
    _config_path: &Path,
    _config_tx: &mpsc::UnboundedSender<ProxyConfig>,
) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C");
    shutdown.trigger();
    Ok(())
}
