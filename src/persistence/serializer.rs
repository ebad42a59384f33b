use super::block::write_block;
use crate::domain::Entry;
use anyhow::Result;
use serde::Serialize;

/// The current archive schema: `{ "entries": [...] }`
#[derive(Serialize)]
struct ArchiveDocument<'a> {
    entries: &'a [Entry],
}

/// Serialize entries as the block payload (pretty JSON, so the note stays
/// readable and hand-editable)
pub fn serialize_entries(entries: &[Entry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ArchiveDocument { entries })?)
}

/// Produce the full document text after writing `entries` into `existing`
pub fn serialize_document(existing: Option<&str>, entries: &[Entry]) -> Result<String> {
    let payload = serialize_entries(entries)?;
    Ok(write_block(existing, &payload))
}
