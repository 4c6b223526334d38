//! Filesystem changes as recompilation events for the standalone dev server.
//!
//! Bursts of changes (an editor writing a file in several steps, a formatter touching many
//! files) are coalesced into a single event.

use crate::error::{Error, Result};
use log::{debug, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Quiet period that ends a burst of changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Stream of debounced change notifications. Dropping it stops watching.
pub struct RecompileEvents {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
}

impl RecompileEvents {
    /// Waits for the next burst of changes and returns the paths it touched.
    /// Returns `None` once the watcher has shut down.
    pub async fn next(&mut self) -> Option<Vec<PathBuf>> {
        let first = self.rx.recv().await?;
        let mut changed = vec![first];

        while let Ok(Some(path)) = tokio::time::timeout(self.debounce, self.rx.recv()).await {
            if !changed.contains(&path) {
                changed.push(path);
            }
        }

        debug!("Change burst touched {} path(s)", changed.len());
        Some(changed)
    }
}

/// What to watch: directories recursively, plus single files.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    pub dirs: Vec<PathBuf>,
    /// Watched through their parent directory, so a file replaced by a rename (the way most
    /// editors save) keeps being watched.
    pub files: Vec<PathBuf>,
    /// Changes under these prefixes are dropped, so the watcher does not react to files it
    /// causes to be written.
    pub ignored: Vec<PathBuf>,
}

impl WatchSet {
    /// Whether a change to `path` belongs to this set.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.ignored.iter().any(|prefix| path.starts_with(prefix)) {
            return false;
        }
        self.dirs.iter().any(|dir| path.starts_with(dir))
            || self.files.iter().any(|file| file == path)
    }
}

/// Whether `event` should trigger a recompilation.
pub fn is_relevant(event: &Event, set: &WatchSet) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matters && event.paths.iter().any(|path| set.accepts(path))
}

/// Starts watching everything in `set`.
pub fn watch(set: WatchSet, debounce: Duration) -> Result<RecompileEvents> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut parents: Vec<PathBuf> = set
        .files
        .iter()
        .filter_map(|file| file.parent().map(Path::to_path_buf))
        .collect();
    parents.sort();
    parents.dedup();
    let dirs = set.dirs.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event, &set) => {
                for path in event.paths {
                    if set.accepts(&path) {
                        let _ = tx.send(path);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Watch error: {}", e),
        },
        Config::default(),
    )
    .map_err(|e| Error::Server(format!("cannot start file watcher: {}", e)))?;

    let targets = dirs
        .iter()
        .map(|dir| (dir, RecursiveMode::Recursive))
        .chain(parents.iter().map(|dir| (dir, RecursiveMode::NonRecursive)));
    for (path, mode) in targets {
        watcher
            .watch(path, mode)
            .map_err(|e| Error::Server(format!("cannot watch {}: {}", path.display(), e)))?;
        debug!("Watching {}", path.display());
    }

    Ok(RecompileEvents {
        _watcher: watcher,
        rx,
        debounce,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn app_set() -> WatchSet {
        WatchSet {
            dirs: vec![PathBuf::from("/app/src")],
            files: vec![PathBuf::from("/app/openapi.yaml")],
            ignored: vec![
                PathBuf::from("/app/node_modules"),
                PathBuf::from("/app/.openapi-devkit"),
            ],
        }
    }

    async fn next_burst(events: &mut RecompileEvents) -> Vec<PathBuf> {
        tokio::time::timeout(Duration::from_secs(10), events.next())
            .await
            .expect("no change event within timeout")
            .expect("watcher closed")
    }

    #[test]
    fn test_content_changes_are_relevant() {
        let set = app_set();
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "/app/src/a.ts"), &set));
        assert!(is_relevant(&event(EventKind::Modify(ModifyKind::Any), "/app/openapi.yaml"), &set));
    }

    #[test]
    fn test_access_events_are_ignored() {
        let e = event(EventKind::Access(AccessKind::Any), "/app/src/a.ts");
        assert!(!is_relevant(&e, &app_set()));
    }

    #[test]
    fn test_siblings_of_watched_files_are_dropped() {
        let e = event(EventKind::Modify(ModifyKind::Any), "/app/package.json");
        assert!(!is_relevant(&e, &app_set()));
    }

    #[test]
    fn test_changes_under_ignored_paths_are_dropped() {
        let mut set = app_set();
        set.dirs.push(PathBuf::from("/app"));
        let e = event(
            EventKind::Modify(ModifyKind::Any),
            "/app/node_modules/umi_open_api/umi-plugins_a.json",
        );
        assert!(!is_relevant(&e, &set));
    }

    #[tokio::test]
    async fn test_file_write_produces_event() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let set = WatchSet {
            dirs: vec![root.clone()],
            ..Default::default()
        };
        let mut events = watch(set, Duration::from_millis(50)).unwrap();

        std::fs::write(root.join("api.ts"), "export {}").unwrap();

        let changed = next_burst(&mut events).await;
        assert!(changed.iter().any(|path| path.ends_with("api.ts")));
    }

    #[tokio::test]
    async fn test_file_replaced_by_rename_keeps_being_watched() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let config = root.join("openapi.yaml");
        std::fs::write(&config, "schemaPath: a.json\n").unwrap();
        let set = WatchSet {
            files: vec![config.clone()],
            ..Default::default()
        };
        let mut events = watch(set, Duration::from_millis(50)).unwrap();

        for save in 0..3 {
            let staged = root.join(format!(".openapi.yaml.{}.tmp", save));
            std::fs::write(&staged, format!("schemaPath: {}.json\n", save)).unwrap();
            std::fs::rename(&staged, &config).unwrap();

            let changed = next_burst(&mut events).await;
            assert!(changed.contains(&config), "save {}: {:?}", save, changed);
            assert!(!changed.contains(&staged));
        }
    }
}
