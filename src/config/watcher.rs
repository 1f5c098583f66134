//! Configuration file watcher for hot reload.
//!
//! Both the file watcher and SIGHUP funnel through [`reload_into`], so a
//! reload is always a full load + validation producing a new `ProxyConfig`.
//! Publishing the snapshot is the server's job.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Load `path` and hand the result to `tx`. A broken file keeps the current config.
pub fn reload_into(path: &Path, tx: &mpsc::UnboundedSender<ProxyConfig>) -> bool {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), origins = config.origins.len(), "Configuration reloaded");
            tx.send(config).is_ok()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to reload config, keeping current configuration");
            false
        }
    }
}

/// Watches the configuration file and publishes every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a watcher publishing into `update_tx`.
    pub fn new(path: &Path, update_tx: mpsc::UnboundedSender<ProxyConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            update_tx,
        }
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::debug!(kind = ?event.kind, "Config file change detected");
                    reload_into(&path, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_is_not_published() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!reload_into(Path::new("/nonexistent/cloudfauxnt.toml"), &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_valid_file_is_published() {
        let path = std::env::temp_dir().join(format!("cloudfauxnt-watch-{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nbind_address = \"127.0.0.1:0\"\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(reload_into(&path, &tx));
        let config = rx.try_recv().unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:0");

        let _ = std::fs::remove_file(path);
    }
}
