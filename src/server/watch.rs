//! Installs a debounced file watcher on `CONFIG_PATH`. Kubernetes
//! projects ConfigMap volumes via an atomic symlink swap, which fires a burst of
//! filesystem events per update; `notify-debouncer-mini` collapses a burst into a
//! single notification once the directory has been quiet for the stability window.
use std::{path::Path, sync::Arc, time::Duration};

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{reload_config, ServerState};

/// Debounce quiescence window before a config change is accepted.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Watches `path` for changes and, once stable, reloads it into `state.config` and
/// notifies `reload_tx` so the ping scheduler restarts with the new interval.
///
/// The returned debouncer must be kept alive for the watch to keep running; dropping
/// it tears down the underlying OS watch.
pub fn spawn(
    path: &Path,
    state: Arc<ServerState>,
    reload_tx: watch::Sender<()>,
) -> notify::Result<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, move |result| {
        // Runs on the debouncer's own thread; hand off to the async world.
        let _ = tx.send(result);
    })?;

    // The directory, not the file: kubelet replaces the file via a symlink swap,
    // which some platforms report as a delete+create on the watched path itself.
    let watch_target = path.parent().unwrap_or(path);
    debouncer
        .watcher()
        .watch(watch_target, RecursiveMode::NonRecursive)?;

    let owned_path = path.to_path_buf();
    tokio::spawn(async move {
        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) if events.is_empty() => continue,
                Ok(_) => {
                    debug!("{} changed, reloading", owned_path.display());
                    if let Some(new_config) = reload_config(&owned_path).await {
                        state.config.store(Arc::new(new_config));
                        // Ignore the error: no receivers means the ping scheduler
                        // has already shut down.
                        let _ = reload_tx.send(());
                    }
                }
                Err(e) => warn!("file watch error on {}: {}", owned_path.display(), e),
            }
        }
    });

    Ok(debouncer)
}
