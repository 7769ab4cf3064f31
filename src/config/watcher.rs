//! Configuration file watcher for hot reload.
//!
//! The containing directory is watched rather than the file itself, so the
//! local override is noticed even when it is created after startup, and
//! editors that replace files on save still trigger a reload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, local_override_path};
use crate::config::{Config, SharedConfig};

/// Monitors a configuration file and publishes validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Config>,
}

impl ConfigWatcher {
    /// Create a new watcher for `path`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Config>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let names = watched_names(&self.path);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_config_event(&event, &names) => {
                    tracing::info!(path = %path.display(), "Config file change detected, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            NotifyConfig::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = watch_dir(&self.path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(
            path = %self.path.display(),
            local = %local_override_path(&self.path).display(),
            "Config watcher started"
        );
        Ok(watcher)
    }
}

/// Directory holding the config file.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// File names that trigger a reload: the config and its local override.
fn watched_names(path: &Path) -> Vec<OsString> {
    [path.to_path_buf(), local_override_path(path)]
        .iter()
        .filter_map(|p| p.file_name().map(OsString::from))
        .collect()
}

fn is_config_event(event: &Event, names: &[OsString]) -> bool {
    let relevant_kind = event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
    relevant_kind
        && event
            .paths
            .iter()
            .filter_map(|p| p.file_name())
            .any(|name| names.iter().any(|watched| watched == name))
}

/// Apply every received update to the shared snapshot until the channel closes.
pub async fn apply_updates(shared: SharedConfig, mut updates: mpsc::UnboundedReceiver<Config>) {
    while let Some(config) = updates.recv().await {
        shared.store(std::sync::Arc::new(config));
        tracing::info!("Configuration reloaded");
    }
}
