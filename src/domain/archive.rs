use super::entry::{default_name, Entry};
use super::error::ModelError;
use super::time::{normalize, now_iso, parse_instant, to_iso};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Prefix for generated entry names ("Task 3")
pub const DEFAULT_NAME_PREFIX: &str = "Task";

/// Raw values from an edit form. Blank strings have meaning: a blank name
/// gets the default name, a blank end time clears it, a blank start time
/// keeps the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
}

/// Arena of entries keyed by id.
///
/// Parent/child links are stored on both sides (`parent_id` on the child,
/// `sub_entries` on the parent). Only the methods here touch either side,
/// and each keeps the two in step.
#[derive(Debug, Clone)]
pub struct TaskArchive {
    entries: IndexMap<String, Entry>,
    name_prefix: String,
}

impl Default for TaskArchive {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

/// End stamp for stopping an entry at `now`. Equal start and end stamps mark
/// a project, so a task stopped within the millisecond it started ends 1 ms
/// later.
fn stop_time(start_time: &str, now: String) -> String {
    if now != start_time {
        return now;
    }
    match parse_instant(&now) {
        Some(instant) => to_iso(instant + Duration::milliseconds(1)),
        None => now,
    }
}

impl TaskArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh archive from a persisted flat list, repairing broken
    /// links along the way.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut archive = Self::new();
        for mut entry in entries {
            if archive.entries.contains_key(&entry.id) {
                warn!(id = %entry.id, "dropping entry with duplicate id");
                continue;
            }
            entry.reclassify();
            archive.entries.insert(entry.id.clone(), entry);
        }
        archive.repair_links();
        archive
    }

    /// Use a different prefix for generated names
    pub fn with_name_prefix(mut self, prefix: &str) -> Self {
        if !prefix.trim().is_empty() {
            self.name_prefix = prefix.trim().to_string();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flat list for persistence, in insertion order
    pub fn to_entries(&self) -> Vec<Entry> {
        self.entries.values().cloned().collect()
    }

    /// Make the two sides of every parent/child link agree.
    /// `parent_id` is authoritative; child lists are rebuilt from it.
    fn repair_links(&mut self) {
        let ids: Vec<String> = self.entries.keys().cloned().collect();

        for id in &ids {
            let dangling = match self.entries[id.as_str()].parent_id.as_deref() {
                Some(parent) => parent == id.as_str() || !self.entries.contains_key(parent),
                None => false,
            };
            if dangling {
                warn!(id = %id, "clearing unresolvable parent reference");
                if let Some(entry) = self.entries.get_mut(id.as_str()) {
                    entry.parent_id = None;
                }
            }
        }

        for id in &ids {
            if self.closes_cycle(id) {
                warn!(id = %id, "breaking parent cycle");
                if let Some(entry) = self.entries.get_mut(id.as_str()) {
                    entry.parent_id = None;
                }
            }
        }

        for id in &ids {
            let listed = match self.entries.get_mut(id.as_str()) {
                Some(entry) => std::mem::take(&mut entry.sub_entries),
                None => continue,
            };
            let mut seen = HashSet::new();
            let mut kept = Vec::with_capacity(listed.len());
            for child in listed {
                let owned = self
                    .entries
                    .get(child.as_str())
                    .is_some_and(|c| c.parent_id.as_deref() == Some(id.as_str()));
                if owned && seen.insert(child.clone()) {
                    kept.push(child);
                } else {
                    warn!(parent = %id, child = %child, "dropping stale child reference");
                }
            }
            if let Some(entry) = self.entries.get_mut(id.as_str()) {
                entry.sub_entries = kept;
            }
        }

        for id in &ids {
            let Some(parent) = self.entries[id.as_str()].parent_id.clone() else {
                continue;
            };
            if let Some(owner) = self.entries.get_mut(parent.as_str()) {
                if !owner.sub_entries.contains(id) {
                    warn!(parent = %parent, child = %id, "restoring missing child reference");
                    owner.sub_entries.push(id.clone());
                }
            }
        }
    }

    /// Whether following parent links from `id` leads back to `id`
    fn closes_cycle(&self, id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.entries.get(id).and_then(|e| e.parent_id.as_deref());
        while let Some(parent) = current {
            if parent == id {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            current = self.entries.get(parent).and_then(|e| e.parent_id.as_deref());
        }
        false
    }

    fn resolve_name(&self, name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            default_name(&self.name_prefix, self.entries.len())
        } else {
            trimmed.to_string()
        }
    }

    fn insert(&mut self, entry: Entry) -> &Entry {
        let (index, _) = self.entries.insert_full(entry.id.clone(), entry);
        &self.entries[index]
    }

    fn require(&self, id: &str) -> Result<&Entry, ModelError> {
        self.entries
            .get(id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Entry, ModelError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))
    }

    /// Put `child` at the front of `parent`'s list and point it back
    fn link_front(&mut self, parent: &str, child: &str) {
        if let Some(owner) = self.entries.get_mut(parent) {
            owner.sub_entries.retain(|id| id != child);
            owner.sub_entries.insert(0, child.to_string());
        }
        if let Some(entry) = self.entries.get_mut(child) {
            entry.parent_id = Some(parent.to_string());
        }
    }

    /// Put `child` at the end of `parent`'s list and point it back
    fn link_back(&mut self, parent: &str, child: &str) {
        if let Some(owner) = self.entries.get_mut(parent) {
            owner.sub_entries.retain(|id| id != child);
            owner.sub_entries.push(child.to_string());
        }
        if let Some(entry) = self.entries.get_mut(child) {
            entry.parent_id = Some(parent.to_string());
        }
    }

    /// Drop `id`'s parent link on both sides. Returns the former parent.
    fn detach(&mut self, id: &str) -> Option<String> {
        let parent = self.entries.get_mut(id)?.parent_id.take()?;
        if let Some(owner) = self.entries.get_mut(parent.as_str()) {
            owner.sub_entries.retain(|child| child != id);
        }
        Some(parent)
    }

    // Creation

    /// Start a new running top-level task
    pub fn append(&mut self, name: &str) -> &Entry {
        let entry = Entry::started_now(self.resolve_name(name));
        debug!(id = %entry.id, name = %entry.name, "appended task");
        self.insert(entry)
    }

    /// Create a new top-level project (zero-duration container)
    pub fn append_project(&mut self, name: &str) -> &Entry {
        let entry = Entry::project_now(self.resolve_name(name));
        debug!(id = %entry.id, name = %entry.name, "appended project");
        self.insert(entry)
    }

    /// Start a running sub-task under `parent_id`, promoting the parent to a
    /// project first when it is a plain task.
    pub fn create_sub_task(&mut self, parent_id: &str, name: &str) -> Result<&Entry, ModelError> {
        self.require(parent_id)?;
        let name = self.resolve_name(name);

        self.split_into_project(parent_id)?;

        let entry = Entry::started_now(name);
        let child_id = entry.id.clone();
        self.entries.insert(child_id.clone(), entry);
        self.link_front(parent_id, &child_id);
        debug!(parent = %parent_id, id = %child_id, "created sub-task");

        self.require(&child_id)
    }

    /// Freeze an entry into a project (`end_time := start_time`).
    /// Returns false when it already was one.
    pub fn promote_to_project(&mut self, id: &str) -> Result<bool, ModelError> {
        let entry = self.require_mut(id)?;
        if entry.is_project() {
            return Ok(false);
        }
        entry.end_time = Some(entry.start_time.clone());
        entry.reclassify();
        Ok(true)
    }

    /// Promote a plain task to a project and keep its work interval as its
    /// first child. Returns false when it already was a project.
    pub fn split_into_project(&mut self, id: &str) -> Result<bool, ModelError> {
        let entry = self.require(id)?;
        if entry.is_project() {
            return Ok(false);
        }

        let carried = entry.carry_over();
        let carried_id = carried.id.clone();
        self.promote_to_project(id)?;
        self.entries.insert(carried_id.clone(), carried);
        self.link_front(id, &carried_id);
        debug!(id = %id, child = %carried_id, "promoted task to project");
        Ok(true)
    }

    // Structure

    /// Whether `id` sits somewhere below `ancestor`
    pub fn is_descendant(&self, ancestor: &str, id: &str) -> bool {
        let mut current = self.entries.get(id).and_then(|e| e.parent_id.as_deref());
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.entries.len() {
                return false;
            }
            current = self.entries.get(parent).and_then(|e| e.parent_id.as_deref());
        }
        false
    }

    /// Move `target` under `new_parent`. Everything is validated before any
    /// change is made.
    pub fn reparent(&mut self, target: &str, new_parent: &str) -> Result<(), ModelError> {
        if target == new_parent {
            return Err(ModelError::SelfParent(target.to_string()));
        }
        self.require(target)?;
        self.require(new_parent)?;
        if self.is_descendant(target, new_parent) {
            return Err(ModelError::Cycle {
                target: target.to_string(),
                parent: new_parent.to_string(),
            });
        }

        self.detach(target);
        self.split_into_project(new_parent)?;
        self.link_back(new_parent, target);
        debug!(id = %target, parent = %new_parent, "reparented entry");
        Ok(())
    }

    /// Make `target` top-level again. Returns false when it already was.
    pub fn unparent(&mut self, target: &str) -> Result<bool, ModelError> {
        self.require(target)?;
        Ok(self.detach(target).is_some())
    }

    // Time

    /// Stop a running entry. Ending a finished entry changes nothing.
    pub fn end(&mut self, id: &str) -> Result<bool, ModelError> {
        let entry = self.require_mut(id)?;
        if entry.end_time.is_some() {
            return Ok(false);
        }
        entry.end_time = Some(stop_time(&entry.start_time, now_iso()));
        entry.reclassify();
        Ok(true)
    }

    /// Stop every running entry at the same instant. Returns how many.
    pub fn end_all(&mut self) -> usize {
        let now = now_iso();
        let mut ended = 0;
        for entry in self.entries.values_mut() {
            if entry.end_time.is_none() {
                entry.end_time = Some(stop_time(&entry.start_time, now.clone()));
                entry.reclassify();
                ended += 1;
            }
        }
        ended
    }

    /// Overwrite name and times from an edit form
    pub fn update(&mut self, id: &str, update: &EntryUpdate) -> Result<(), ModelError> {
        let current = self.require(id)?;

        let start_time = if update.start_time.trim().is_empty() {
            normalize(&current.start_time).unwrap_or_else(|| current.start_time.clone())
        } else {
            normalize(&update.start_time)
                .ok_or_else(|| ModelError::InvalidTimestamp(update.start_time.clone()))?
        };
        let end_time = if update.end_time.trim().is_empty() {
            None
        } else {
            Some(
                normalize(&update.end_time)
                    .ok_or_else(|| ModelError::InvalidTimestamp(update.end_time.clone()))?,
            )
        };

        if let Some(end) = &end_time {
            if let (Some(s), Some(e)) = (parse_instant(&start_time), parse_instant(end)) {
                if e < s {
                    return Err(ModelError::InvalidInterval {
                        start: start_time,
                        end: end.clone(),
                    });
                }
            }
        }

        let name = self.resolve_name(&update.name);
        let entry = self.require_mut(id)?;
        entry.name = name;
        entry.start_time = start_time;
        entry.end_time = end_time;
        entry.reclassify();
        Ok(())
    }

    // Removal

    /// Delete an entry and everything below it. Returns the removed ids,
    /// descendants first.
    pub fn delete(&mut self, id: &str) -> Result<Vec<String>, ModelError> {
        self.require(id)?;
        self.detach(id);
        let mut removed = Vec::new();
        self.delete_subtree(id, &mut removed);
        debug!(id = %id, count = removed.len(), "deleted entry");
        Ok(removed)
    }

    fn delete_subtree(&mut self, id: &str, removed: &mut Vec<String>) {
        let children = match self.entries.get(id) {
            Some(entry) => entry.sub_entries.clone(),
            None => return,
        };
        for child in &children {
            self.delete_subtree(child, removed);
        }
        if self.entries.shift_remove(id).is_some() {
            removed.push(id.to_string());
        }
    }

    // Queries

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Exact id, or the single entry whose id starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&Entry> {
        if let Some(entry) = self.entries.get(prefix) {
            return Some(entry);
        }
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self.entries.values().filter(|e| e.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    /// Most recent first; ties keep insertion order, unparsable starts sink
    fn sorted<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<&'a Entry> {
        let mut list: Vec<&Entry> = entries.collect();
        list.sort_by(|a, b| {
            let a_start = parse_instant(&a.start_time);
            let b_start = parse_instant(&b.start_time);
            b_start.cmp(&a_start)
        });
        list
    }

    pub fn list_all(&self) -> Vec<&Entry> {
        Self::sorted(self.entries.values())
    }

    pub fn list_top_level(&self) -> Vec<&Entry> {
        Self::sorted(self.entries.values().filter(|e| !e.is_sub_entry()))
    }

    pub fn list_children(&self, id: &str) -> Vec<&Entry> {
        match self.entries.get(id) {
            Some(entry) => Self::sorted(
                entry
                    .sub_entries
                    .iter()
                    .filter_map(|child| self.entries.get(child.as_str())),
            ),
            None => Vec::new(),
        }
    }

    pub fn list_running(&self) -> Vec<&Entry> {
        Self::sorted(self.entries.values().filter(|e| e.is_running()))
    }

    /// Sum of the direct children's own elapsed time
    pub fn project_duration(&self, id: &str, now: DateTime<Utc>) -> Duration {
        let total = self
            .list_children(id)
            .iter()
            .map(|child| child.elapsed(now))
            .fold(Duration::zero(), |acc, elapsed| acc + elapsed);
        std::cmp::max(Duration::zero(), total)
    }

    /// Display duration: the children's total for a project, otherwise the
    /// entry's own elapsed time
    pub fn duration(&self, id: &str, now: DateTime<Utc>) -> Option<Duration> {
        let entry = self.entries.get(id)?;
        if entry.is_project() {
            Some(self.project_duration(id, now))
        } else {
            Some(entry.elapsed(now))
        }
    }
}
