use super::block::find_block;
use super::files::{atomic_write, ensure_dir, read_file};
use super::migration::flatten_legacy;
use super::parser::{parse_payload, ArchivePayload};
use super::serializer::serialize_document;
use crate::domain::Entry;
use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

/// An archive document as read from disk
#[derive(Debug, Default)]
pub struct LoadedArchive {
    /// Document text, `None` when the document does not exist
    pub text: Option<String>,
    pub entries: Vec<Entry>,
}

/// Load the flat entry list from an archive document.
///
/// A missing document, a document without a block, and a block that cannot
/// be parsed all load as an empty archive. Only I/O failures are errors.
pub fn load_archive(path: &Path) -> Result<LoadedArchive> {
    let Some(text) = read_file(path)? else {
        debug!(path = %path.display(), "archive document does not exist");
        return Ok(LoadedArchive::default());
    };
    let entries = entries_from_document(&text);
    Ok(LoadedArchive {
        text: Some(text),
        entries,
    })
}

/// Extract entries from document text, migrating the legacy format
pub fn entries_from_document(content: &str) -> Vec<Entry> {
    let Some(block) = find_block(content) else {
        debug!("no archive block in document");
        return Vec::new();
    };

    match parse_payload(block.payload) {
        Ok(ArchivePayload::Current(mut entries)) => {
            entries.iter_mut().for_each(Entry::reclassify);
            entries
        }
        Ok(ArchivePayload::Legacy(nodes)) => {
            let entries = flatten_legacy(&nodes);
            info!(count = entries.len(), "migrated legacy archive block");
            entries
        }
        Err(e) => {
            warn!(error = %e, "malformed archive block, loading as empty");
            Vec::new()
        }
    }
}

/// Write entries into the archive document, replacing only the block.
/// Returns the text that was written.
pub fn save_archive(entries: &[Entry], path: &Path) -> Result<String> {
    let existing = read_file(path)?;
    if existing.is_none() {
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }
    }

    let document = serialize_document(existing.as_deref(), entries)?;
    atomic_write(path, &document)?;
    debug!(path = %path.display(), count = entries.len(), "saved archive");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskArchive;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    const CURRENT_DOC: &str = "# Timesheet\n\nNotes before.\n\n```json\n{\n  \"entries\": [\n    {\"id\": \"p\", \"name\": \"P\", \"startTime\": \"2024-05-01T09:00:00.000Z\", \"endTime\": \"2024-05-01T09:00:00.000Z\", \"subEntries\": [\"c\"]},\n    {\"id\": \"c\", \"name\": \"C\", \"startTime\": \"2024-05-01T09:10:00.000Z\", \"endTime\": null, \"parentId\": \"p\"}\n  ]\n}\n```\n\n- trailing note\n";

    fn ids(entries: &[Entry]) -> BTreeSet<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_load_missing_document() {
        let temp_dir = tempdir().unwrap();
        let loaded = load_archive(&temp_dir.path().join("none.md")).unwrap();
        assert_eq!(loaded.text, None);
        assert!(loaded.entries.is_empty());
    }

    #[test]
    fn test_load_without_block() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01.md");
        fs::write(&path, "# Just notes\n\nnothing here\n").unwrap();

        assert!(load_archive(&path).unwrap().entries.is_empty());
    }

    #[test]
    fn test_load_malformed_block() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01.md");
        fs::write(&path, "```json\n{\"entries\": [oops\n```\n").unwrap();

        assert!(load_archive(&path).unwrap().entries.is_empty());
    }

    #[test]
    fn test_load_current_document() {
        let entries = entries_from_document(CURRENT_DOC);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].parent_id.as_deref(), Some("p"));
    }

    #[test]
    fn test_round_trip_preserves_surroundings() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01_archive.md");
        fs::write(&path, CURRENT_DOC).unwrap();

        let loaded = load_archive(&path).unwrap().entries;
        save_archive(&loaded, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let block = find_block(&written).unwrap();
        let original = find_block(CURRENT_DOC).unwrap();
        assert_eq!(&written[..block.range.start], &CURRENT_DOC[..original.range.start]);
        assert_eq!(&written[block.range.end..], &CURRENT_DOC[original.range.end..]);

        let reloaded = load_archive(&path).unwrap().entries;
        assert_eq!(ids(&reloaded), ids(&loaded));
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn test_save_appends_block_to_plain_note() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01.md");
        fs::write(&path, "# Notes\n").unwrap();

        let mut archive = TaskArchive::new();
        archive.append("Write report");
        let written = save_archive(&archive.to_entries(), &path).unwrap();

        assert!(written.starts_with("# Notes\n\n```json\n"));
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
        assert_eq!(load_archive(&path).unwrap().entries.len(), 1);
    }

    #[test]
    fn test_save_fills_empty_block() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01.md");
        fs::write(&path, "notes\n```json\n```\n").unwrap();
        assert!(load_archive(&path).unwrap().entries.is_empty());

        let mut archive = TaskArchive::new();
        archive.append("kept");
        let first = save_archive(&archive.to_entries(), &path).unwrap();
        assert!(first.starts_with("notes\n```json\n{"));
        assert!(first.ends_with("}\n```\n"));

        let loaded = load_archive(&path).unwrap();
        assert_eq!(loaded.text.as_deref(), Some(first.as_str()));
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].name, "kept");

        let second = save_archive(&loaded.entries, &path).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_save_creates_missing_folder() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("2024-05-01.md");

        save_archive(&[], &path).unwrap();

        assert!(path.exists());
        assert!(load_archive(&path).unwrap().entries.is_empty());
    }

    #[test]
    fn test_legacy_document_migrates_and_saves_current() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("2024-05-01.md");
        let legacy = r#"Old log

```json
{"entries": [{"name": "A", "startTime": "2024-05-01T09:00:00.000Z", "endTime": null, "subEntries": [
  {"name": "Part 1", "startTime": "2024-05-01T09:00:00.000Z", "endTime": "2024-05-01T09:30:00.000Z", "subEntries": null},
  {"name": "X", "startTime": "2024-05-01T10:00:00.000Z", "endTime": "2024-05-01T10:30:00.000Z", "subEntries": null}
]}]}
```
"#;
        fs::write(&path, legacy).unwrap();

        let entries = load_archive(&path).unwrap().entries;
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "X"]);

        save_archive(&entries, &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Old log\n\n```json\n"));
        assert!(written.contains("\"id\""));
        assert_eq!(load_archive(&path).unwrap().entries, entries);
    }
}
