use crate::domain::Entry;
use serde::Deserialize;

/// A node of the legacy nested format: no ids, children inline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNode {
    #[serde(default)]
    pub name: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub sub_entries: Option<Vec<LegacyNode>>,
}

impl LegacyNode {
    pub fn children(&self) -> &[LegacyNode] {
        self.sub_entries.as_deref().unwrap_or_default()
    }
}

/// What a block payload turned out to contain
#[derive(Debug, Clone, PartialEq)]
pub enum ArchivePayload {
    /// Flat, id-addressed entries
    Current(Vec<Entry>),
    /// Nested id-less tree, to be flattened
    Legacy(Vec<LegacyNode>),
}

/// Accepted shapes, tried in order. Current entries require an `id` and a
/// string list of children, so legacy trees never match them.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Current { entries: Vec<Entry> },
    Bare(Vec<Entry>),
    Legacy { entries: Vec<LegacyNode> },
}

/// Parse the text inside an archive block
pub fn parse_payload(payload: &str) -> Result<ArchivePayload, serde_json::Error> {
    let raw: RawPayload = serde_json::from_str(payload)?;
    Ok(match raw {
        RawPayload::Current { entries } | RawPayload::Bare(entries) => {
            ArchivePayload::Current(entries)
        }
        RawPayload::Legacy { entries } => ArchivePayload::Legacy(entries),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_current_schema() {
        let payload = r#"{
            "entries": [
                {"id": "p", "name": "P", "startTime": "2024-05-01T09:00:00.000Z",
                 "endTime": "2024-05-01T09:00:00.000Z", "subEntries": ["c"]},
                {"id": "c", "name": "C", "startTime": "2024-05-01T09:10:00.000Z",
                 "endTime": null, "parentId": "p"}
            ]
        }"#;

        let ArchivePayload::Current(entries) = parse_payload(payload).unwrap() else {
            panic!("expected current schema");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sub_entries, vec!["c".to_string()]);
        assert_eq!(entries[1].parent_id.as_deref(), Some("p"));
    }

    #[test]
    fn test_parse_empty_current() {
        assert_eq!(
            parse_payload(r#"{"entries": []}"#).unwrap(),
            ArchivePayload::Current(Vec::new())
        );
    }

    #[test]
    fn test_parse_bare_array() {
        let payload = r#"[{"id": "a", "name": "A", "startTime": "2024-05-01T09:00:00.000Z"}]"#;
        let ArchivePayload::Current(entries) = parse_payload(payload).unwrap() else {
            panic!("expected current schema");
        };
        assert_eq!(entries[0].id, "a");
    }

    #[test]
    fn test_parse_legacy_schema() {
        let payload = r#"{
            "entries": [
                {"name": "A", "startTime": "2024-05-01T09:00:00.000Z", "endTime": null,
                 "subEntries": [
                    {"name": "Part 1", "startTime": "2024-05-01T09:00:00.000Z",
                     "endTime": "2024-05-01T09:30:00.000Z", "subEntries": null}
                 ]}
            ]
        }"#;

        let ArchivePayload::Legacy(nodes) = parse_payload(payload).unwrap() else {
            panic!("expected legacy schema");
        };
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children().len(), 1);
        assert_eq!(nodes[0].children()[0].name, "Part 1");
        assert!(nodes[0].children()[0].children().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_payload("{not json").is_err());
        assert!(parse_payload(r#"{"tasks": []}"#).is_err());
        assert!(parse_payload(r#"{"entries": [{"name": "no start"}]}"#).is_err());
    }
}
