use crate::domain::{ChangeKind, Entry, EntryUpdate, ModelError, TaskArchive};
use crate::persistence::{
    archive_file_name, ensure_dir, list_archive_files, load_archive, load_settings, save_archive,
    save_settings, settings_file, LoadedArchive, Settings,
};
use crate::ticker::{RefreshGate, RefreshToken};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the active archive lives: a folder plus a selectable document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveAddress {
    pub folder: PathBuf,
    pub file_name: String,
}

impl ArchiveAddress {
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }
}

/// What the app is doing with the archive document right now. A reload is
/// never interleaved with a write of the same document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    Idle,
    Persisting,
    Reloading,
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(ChangeKind)>;

/// Application state: the archive plus everything needed to keep it on disk
/// and tell the presentation layer about changes.
pub struct TimerApp {
    archive: TaskArchive,
    address: ArchiveAddress,
    settings: Settings,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    io_phase: IoPhase,
    pending_reload: bool,
    /// Document text from our last save or load, to recognize our own writes
    last_seen: Option<String>,
    refresh: RefreshGate,
    pub needs_save: bool,
}

/// Stale ids come from UI races; they are logged and ignored
fn skip_missing<T>(operation: &str, result: Result<T, ModelError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            warn!(operation, error = %e, "ignoring command for missing entry");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_file_name(file_name: &str) -> Result<()> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        anyhow::bail!("Invalid archive file name: {:?}", file_name);
    }
    Ok(())
}

impl TimerApp {
    /// Open the archive folder. `file_override` picks a document for this
    /// session only; otherwise the remembered one (or today's) is used.
    pub fn open(folder: &Path, file_override: Option<&str>) -> Result<Self> {
        ensure_dir(folder)?;
        let settings = load_settings(settings_file(folder))?;

        let file_name = match file_override {
            Some(name) => {
                validate_file_name(name)?;
                name.to_string()
            }
            None => settings
                .active_file
                .clone()
                .unwrap_or_else(|| archive_file_name(chrono::Local::now().date_naive())),
        };

        let mut app = Self {
            archive: TaskArchive::new().with_name_prefix(&settings.name_prefix),
            address: ArchiveAddress {
                folder: folder.to_path_buf(),
                file_name,
            },
            settings,
            listeners: Vec::new(),
            next_subscription: 0,
            io_phase: IoPhase::Idle,
            pending_reload: false,
            last_seen: None,
            refresh: RefreshGate::default(),
            needs_save: false,
        };
        let path = app.address.path();
        let loaded = app.read_document(&path)?;
        app.install(loaded);
        Ok(app)
    }

    fn read_document(&mut self, path: &Path) -> Result<LoadedArchive> {
        self.io_phase = IoPhase::Reloading;
        let loaded = load_archive(path);
        self.io_phase = IoPhase::Idle;
        loaded
    }

    /// Replace the in-memory archive wholesale with a loaded document
    fn install(&mut self, loaded: LoadedArchive) {
        if self.needs_save {
            warn!("reloading over unsaved changes");
        }
        self.archive =
            TaskArchive::from_entries(loaded.entries).with_name_prefix(&self.settings.name_prefix);
        self.last_seen = loaded.text;
        self.needs_save = false;
        info!(
            path = %self.address.path().display(),
            count = self.archive.len(),
            "loaded archive"
        );
    }

    // Observers

    /// Register for "model changed" signals
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(ChangeKind) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, kind: ChangeKind) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(kind);
        }
    }

    // Persistence

    /// Write the archive to the active document. On failure the in-memory
    /// state is kept and `needs_save` stays set.
    pub fn persist(&mut self) -> Result<()> {
        self.io_phase = IoPhase::Persisting;
        let result = save_archive(&self.archive.to_entries(), &self.address.path());
        self.io_phase = IoPhase::Idle;

        let document = result?;
        self.last_seen = Some(document);
        self.needs_save = false;

        if std::mem::take(&mut self.pending_reload) {
            self.handle_external_change()?;
        }
        Ok(())
    }

    /// Persist, then signal subscribers. Subscribers hear about the change
    /// even when the write fails, since the change stands in memory.
    fn commit(&mut self) -> Result<()> {
        self.needs_save = true;
        let result = self.persist();
        self.notify(ChangeKind::Mutated);
        result
    }

    /// React to the active document changing on disk. Returns whether the
    /// archive was rebuilt.
    pub fn handle_external_change(&mut self) -> Result<bool> {
        match self.io_phase {
            IoPhase::Persisting => {
                debug!("change notification during save, deferring reload");
                self.pending_reload = true;
                return Ok(false);
            }
            IoPhase::Reloading => return Ok(false),
            IoPhase::Idle => {}
        }

        let path = self.address.path();
        let loaded = self.read_document(&path)?;
        if loaded.text == self.last_seen {
            debug!("change notification matches our own write, skipping reload");
            return Ok(false);
        }

        self.install(loaded);
        self.notify(ChangeKind::Reloaded);
        Ok(true)
    }

    // Commands

    /// End everything running, then start a new top-level task
    pub fn start_new_task(&mut self, name: &str) -> Result<String> {
        self.archive.end_all();
        let id = self.archive.append(name).id.clone();
        self.commit()?;
        Ok(id)
    }

    /// Start a task alongside whatever is already running
    pub fn append_task(&mut self, name: &str) -> Result<String> {
        let id = self.archive.append(name).id.clone();
        self.commit()?;
        Ok(id)
    }

    pub fn append_project(&mut self, name: &str) -> Result<String> {
        let id = self.archive.append_project(name).id.clone();
        self.commit()?;
        Ok(id)
    }

    /// Start a sub-task under `parent_id`. `None` when the parent is gone.
    pub fn start_sub_task(&mut self, parent_id: &str, name: &str) -> Result<Option<String>> {
        let created = self
            .archive
            .create_sub_task(parent_id, name)
            .map(|entry| entry.id.clone());
        let Some(id) = skip_missing("start_sub_task", created)? else {
            return Ok(None);
        };
        self.commit()?;
        Ok(Some(id))
    }

    pub fn end_task(&mut self, id: &str) -> Result<()> {
        if skip_missing("end_task", self.archive.end(id))? == Some(true) {
            self.commit()?;
        }
        Ok(())
    }

    /// Returns how many entries were stopped
    pub fn end_all_tasks(&mut self) -> Result<usize> {
        let ended = self.archive.end_all();
        if ended > 0 {
            self.commit()?;
        }
        Ok(ended)
    }

    pub fn update_task(&mut self, id: &str, update: &EntryUpdate) -> Result<()> {
        if skip_missing("update_task", self.archive.update(id, update))?.is_some() {
            self.commit()?;
        }
        Ok(())
    }

    /// Clear the end time so the entry runs again
    pub fn reset_task(&mut self, id: &str) -> Result<()> {
        let Some(entry) = self.archive.get(id) else {
            warn!(operation = "reset_task", id, "ignoring command for missing entry");
            return Ok(());
        };
        let update = EntryUpdate {
            name: entry.name.clone(),
            start_time: String::new(),
            end_time: String::new(),
        };
        self.update_task(id, &update)
    }

    /// Delete an entry and its descendants. Returns the removed ids.
    pub fn delete_task(&mut self, id: &str) -> Result<Vec<String>> {
        let Some(removed) = skip_missing("delete_task", self.archive.delete(id))? else {
            return Ok(Vec::new());
        };
        self.commit()?;
        Ok(removed)
    }

    pub fn reparent_task(&mut self, id: &str, parent_id: &str) -> Result<()> {
        if skip_missing("reparent_task", self.archive.reparent(id, parent_id))?.is_some() {
            self.commit()?;
        }
        Ok(())
    }

    pub fn clear_parent(&mut self, id: &str) -> Result<()> {
        if skip_missing("clear_parent", self.archive.unparent(id))? == Some(true) {
            self.commit()?;
        }
        Ok(())
    }

    // Queries

    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.archive.get(id)
    }

    /// Lookup by id or unique id prefix
    pub fn find(&self, prefix: &str) -> Option<&Entry> {
        self.archive.find_by_prefix(prefix)
    }

    pub fn all(&self) -> Vec<&Entry> {
        self.archive.list_all()
    }

    pub fn top_level(&self) -> Vec<&Entry> {
        self.archive.list_top_level()
    }

    pub fn children(&self, id: &str) -> Vec<&Entry> {
        self.archive.list_children(id)
    }

    pub fn running(&self) -> Vec<&Entry> {
        self.archive.list_running()
    }

    pub fn duration(&self, id: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.archive.duration(id, now)
    }

    pub fn project_duration(&self, id: &str, now: DateTime<Utc>) -> Duration {
        self.archive.project_duration(id, now)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // Address

    pub fn address(&self) -> &ArchiveAddress {
        &self.address
    }

    /// Candidate archive documents in the active folder
    pub fn list_archive_files(&self) -> Result<Vec<String>> {
        list_archive_files(&self.address.folder)
    }

    /// Make another document in the folder the active archive and remember
    /// the choice. Outstanding refresh tokens go stale. If the current
    /// archive cannot be saved or the new one cannot be read, nothing
    /// changes.
    pub fn switch_address(&mut self, file_name: &str) -> Result<()> {
        validate_file_name(file_name)?;
        if self.needs_save {
            self.persist()?;
        }

        let path = self.address.folder.join(file_name);
        let loaded = self.read_document(&path)?;

        self.refresh.supersede();
        self.address.file_name = file_name.to_string();
        self.install(loaded);

        self.settings.active_file = Some(file_name.to_string());
        if let Err(e) = save_settings(settings_file(&self.address.folder), &self.settings) {
            warn!(error = %e, "could not remember the active archive");
        }

        self.notify(ChangeKind::AddressSwitched);
        Ok(())
    }

    // Display refresh

    /// Token for a duration refresh loop against the current archive
    pub fn start_refresh(&self) -> RefreshToken {
        self.refresh.token()
    }

    /// Current durations for `ids`, skipping ids that no longer exist.
    /// `None` once the token is stale.
    pub fn refresh_durations(
        &self,
        token: RefreshToken,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> Option<Vec<(String, Duration)>> {
        if !self.refresh.is_current(token) {
            return None;
        }
        Some(
            ids.iter()
                .filter_map(|id| {
                    self.archive
                        .duration(id, now)
                        .map(|duration| (id.clone(), duration))
                })
                .collect(),
        )
    }
}
