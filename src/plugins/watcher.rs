//! Hot-reload watcher - periodically re-scan the plugin directory
//!
//! The watcher keeps its own last-known snapshot and only talks to the
//! orchestrator through its mailbox. A scan that fails is logged and the
//! previous snapshot is kept for the next tick.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::classifier::PluginRecord;
use super::loader::scan_registry;
use crate::Result;
use crate::orchestrator::WeakOrchestratorHandle;

/// Polls a plugin directory and reports registry changes
#[derive(Debug)]
pub struct PluginWatcher {
    root: PathBuf,
    interval: Duration,
    known: Vec<PluginRecord>,
}

impl PluginWatcher {
    /// Create a watcher seeded with the registry that was just loaded
    #[must_use]
    pub const fn new(root: PathBuf, interval: Duration, known: Vec<PluginRecord>) -> Self {
        Self {
            root,
            interval,
            known,
        }
    }

    /// Directory being watched
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last snapshot the watcher reported (or was seeded with)
    #[must_use]
    pub fn snapshot(&self) -> &[PluginRecord] {
        &self.known
    }

    /// Scan once and return the new snapshot if the plugin set changed
    pub fn poll(&mut self) -> Option<Vec<PluginRecord>> {
        let scan = scan_registry(&self.root);
        self.reconcile(scan)
    }

    /// Fold a scan result into the known snapshot
    ///
    /// Returns the full new snapshot when the set of plugin paths differs
    /// from the previous one, `None` when nothing changed or the scan failed.
    pub fn reconcile(&mut self, scan: Result<Vec<PluginRecord>>) -> Option<Vec<PluginRecord>> {
        let current = match scan {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "plugin rescan failed, keeping previous registry"
                );
                return None;
            }
        };

        let before = path_set(&self.known);
        let after = path_set(&current);
        if before == after {
            return None;
        }

        let added = after.difference(&before).count();
        let removed = before.difference(&after).count();
        tracing::info!(added, removed, total = current.len(), "plugin registry changed");

        self.known.clone_from(&current);
        Some(current)
    }

    /// Run the watcher on its own task until the orchestrator goes away
    ///
    /// The first scan happens one full interval after spawning, since the
    /// watcher is seeded with a fresh registry.
    #[must_use]
    pub fn spawn(mut self, orchestrator: WeakOrchestratorHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                path = %self.root.display(),
                interval_ms = self.interval.as_millis(),
                "plugin watcher started"
            );

            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(handle) = orchestrator.upgrade() else {
                    break;
                };

                let root = self.root.clone();
                let scan = match tokio::task::spawn_blocking(move || scan_registry(&root)).await {
                    Ok(scan) => scan,
                    Err(e) => {
                        tracing::warn!(error = %e, "plugin scan task failed");
                        continue;
                    }
                };

                let Some(snapshot) = self.reconcile(scan) else {
                    continue;
                };

                if handle.apply_registry_update(snapshot).await.is_err() {
                    break;
                }
            }

            tracing::debug!("plugin watcher stopped");
        })
    }
}

fn path_set(plugins: &[PluginRecord]) -> HashSet<&Path> {
    plugins.iter().map(|p| p.path.as_path()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::plugins::load_registry;

    #[test]
    fn reports_additions_and_removals_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        std::fs::write(dir.path().join("b.rb"), "").unwrap();

        let initial = load_registry(dir.path()).unwrap();
        let mut watcher =
            PluginWatcher::new(dir.path().to_path_buf(), Duration::from_secs(1), initial);

        std::fs::remove_file(dir.path().join("b.rb")).unwrap();
        std::fs::write(dir.path().join("c.sh"), "").unwrap();

        let snapshot = watcher.poll().unwrap();
        let mut names: Vec<&str> = snapshot.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a", "c"]);

        // Unchanged directory on the next tick
        assert!(watcher.poll().is_none());
    }

    #[test]
    fn unchanged_directory_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();

        let initial = load_registry(dir.path()).unwrap();
        let mut watcher =
            PluginWatcher::new(dir.path().to_path_buf(), Duration::from_secs(1), initial);

        assert!(watcher.poll().is_none());
        assert!(watcher.poll().is_none());
    }

    #[test]
    fn unsupported_files_do_not_trigger_updates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();

        let initial = load_registry(dir.path()).unwrap();
        let mut watcher =
            PluginWatcher::new(dir.path().to_path_buf(), Duration::from_secs(1), initial);

        std::fs::write(dir.path().join("README.md"), "").unwrap();
        assert!(watcher.poll().is_none());
    }

    #[test]
    fn failed_scan_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "").unwrap();

        let initial = load_registry(dir.path()).unwrap();
        let mut watcher = PluginWatcher::new(
            dir.path().to_path_buf(),
            Duration::from_secs(1),
            initial.clone(),
        );

        let failed = watcher.reconcile(Err(Error::Scan("temporarily unavailable".to_string())));
        assert!(failed.is_none());
        assert_eq!(watcher.snapshot(), initial.as_slice());

        // Recovers on the next successful scan
        std::fs::write(dir.path().join("b.rb"), "").unwrap();
        assert_eq!(watcher.poll().unwrap().len(), 2);
    }

    #[test]
    fn vanished_directory_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("plugins");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.py"), "").unwrap();

        let initial = load_registry(&root).unwrap();
        let mut watcher = PluginWatcher::new(root.clone(), Duration::from_secs(1), initial);

        std::fs::remove_dir_all(&root).unwrap();
        assert!(watcher.poll().is_none());
        assert_eq!(watcher.snapshot().len(), 1);
    }
}
