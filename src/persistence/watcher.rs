use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches the folder holding one archive document and reports changes to
/// that document only. Dropping it stops the watch.
pub struct ArchiveWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl ArchiveWatcher {
    /// Start watching the document at `path`. Its folder must exist.
    pub fn start(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let dir = path
            .parent()
            .context("Archive path has no parent directory")?
            .to_path_buf();
        let file_name: OsString = path
            .file_name()
            .context("Archive path has no file name")?
            .to_os_string();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(_) => return,
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                // Atomic saves rename a temp file onto the document
                let touched = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));

                if touched {
                    let _ = tx.send(());
                }
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(ArchiveWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll. Drains the queue and returns how many change
    /// notifications were pending.
    pub fn poll(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Whether anything happened to the document since the last poll
    pub fn has_changed(&self) -> bool {
        self.poll() > 0
    }
}
