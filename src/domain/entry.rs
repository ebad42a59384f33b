use super::enums::EntryKind;
use super::time::{elapsed_between, now_iso};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A named time interval, or a zero-duration project container.
///
/// Field names match the persisted JSON. Timestamps stay as strings so a
/// hand-edited archive with a bad value still loads; they are parsed when
/// durations are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Child ids, newest first
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sub_entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Cached classification, refreshed by every mutator
    #[serde(skip)]
    kind: EntryKind,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fresh opaque entry id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Placeholder name for an entry created without one
pub fn default_name(prefix: &str, count: usize) -> String {
    format!("{} {}", prefix, count + 1)
}

impl Entry {
    /// A running top-level entry starting at `start_time`
    pub fn new(name: String, start_time: String) -> Self {
        let mut entry = Self {
            id: new_id(),
            name,
            start_time,
            end_time: None,
            sub_entries: Vec::new(),
            parent_id: None,
            kind: EntryKind::Running,
        };
        entry.reclassify();
        entry
    }

    /// A running entry starting now
    pub fn started_now(name: String) -> Self {
        Self::new(name, now_iso())
    }

    /// A zero-duration project container starting now
    pub fn project_now(name: String) -> Self {
        let start = now_iso();
        let mut entry = Self::new(name, start.clone());
        entry.end_time = Some(start);
        entry.reclassify();
        entry
    }

    /// Copy of this entry's interval under a new id, with no relations.
    /// Used when a task turns into a project and keeps its work as a child.
    pub fn carry_over(&self) -> Self {
        let mut entry = Self::new(self.name.clone(), self.start_time.clone());
        entry.end_time = self.end_time.clone();
        entry.reclassify();
        entry
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Recompute the cached kind from the timestamps
    pub fn reclassify(&mut self) {
        self.kind = EntryKind::classify(&self.start_time, self.end_time.as_deref());
    }

    pub fn is_running(&self) -> bool {
        self.kind.is_running()
    }

    pub fn is_project(&self) -> bool {
        self.kind.is_project()
    }

    pub fn is_sub_entry(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Own elapsed time, `now` standing in for a missing end. Never negative.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(&self.start_time, self.end_time.as_deref(), now)
    }
}

/// Split a leading two-character tag ("[AB] ") off a name
pub fn split_tag(name: &str) -> (Option<&str>, &str) {
    let bytes = name.as_bytes();
    let tagged = bytes.len() >= 5
        && bytes[0] == b'['
        && bytes[3] == b']'
        && bytes[4] == b' '
        && name[1..3].chars().all(|c| c.is_alphanumeric() || c == '_');

    if tagged {
        (Some(&name[1..3]), &name[5..])
    } else {
        (None, name)
    }
}

/// Prefix a name with `[tag] `, replacing any tag already present
pub fn apply_tag(name: &str, tag: &str) -> String {
    let (_, rest) = split_tag(name);
    format!("[{}] {}", tag, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_new_is_running() {
        let entry = Entry::started_now("Write report".to_string());
        assert_eq!(entry.kind(), EntryKind::Running);
        assert!(entry.is_running());
        assert!(!entry.is_sub_entry());
        assert!(entry.sub_entries.is_empty());
    }

    #[test]
    fn test_project_now_uses_sentinel() {
        let project = Entry::project_now("Client work".to_string());
        assert_eq!(project.end_time.as_deref(), Some(project.start_time.as_str()));
        assert!(project.is_project());
        assert_eq!(project.kind(), EntryKind::Project);
    }

    #[test]
    fn test_carry_over_copies_interval_only() {
        let mut original = Entry::new("Draft".to_string(), "2024-05-01T10:00:00.000Z".to_string());
        original.end_time = Some("2024-05-01T11:00:00.000Z".to_string());
        original.parent_id = Some("p".to_string());
        original.reclassify();

        let copy = original.carry_over();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, "Draft");
        assert_eq!(copy.start_time, original.start_time);
        assert_eq!(copy.end_time, original.end_time);
        assert_eq!(copy.parent_id, None);
        assert_eq!(copy.kind(), EntryKind::Done);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut entry = Entry::new("A".to_string(), "2024-05-01T10:00:00.000Z".to_string());
        entry.id = "e1".to_string();

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "e1",
                "name": "A",
                "startTime": "2024-05-01T10:00:00.000Z",
                "endTime": null
            })
        );

        entry.parent_id = Some("p".to_string());
        entry.sub_entries = vec!["c".to_string()];
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["parentId"], "p");
        assert_eq!(json["subEntries"], serde_json::json!(["c"]));
    }

    #[test]
    fn test_deserialize_tolerates_missing_and_null_fields() {
        let entry: Entry = serde_json::from_str(
            r#"{"id":"x","name":"A","startTime":"2024-05-01T10:00:00.000Z","subEntries":null}"#,
        )
        .unwrap();
        assert_eq!(entry.end_time, None);
        assert!(entry.sub_entries.is_empty());
        assert_eq!(entry.parent_id, None);
    }

    #[test]
    fn test_elapsed_of_malformed_entry_is_zero() {
        let entry = Entry::new("Broken".to_string(), "not a time".to_string());
        assert_eq!(entry.elapsed(Utc::now()), Duration::zero());
    }

    #[test]
    fn test_default_name() {
        assert_eq!(default_name("Task", 0), "Task 1");
        assert_eq!(default_name("Task", 4), "Task 5");
    }

    #[test]
    fn test_apply_tag_replaces_existing() {
        assert_eq!(apply_tag("Buy milk", "HM"), "[HM] Buy milk");
        assert_eq!(apply_tag("[HM] Buy milk", "WK"), "[WK] Buy milk");
        assert_eq!(split_tag("[x] short"), (None, "[x] short"));
    }
}
