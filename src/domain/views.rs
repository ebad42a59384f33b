use super::entry::Entry;
use super::enums::EntryKind;
use chrono::{DateTime, Duration, Utc};

/// A flattened row for rendering the entry list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    /// Entry id
    pub id: String,
    /// Depth in the tree (0 = top level)
    pub depth: usize,
    /// Whether this is the last child of its parent
    pub is_last: bool,
}

/// Flatten entries into display order: `top_level` as given, each followed
/// by its children as `children` lists them.
pub fn flatten_entries<'a, F>(top_level: Vec<&'a Entry>, children: F) -> Vec<FlatRow>
where
    F: Fn(&str) -> Vec<&'a Entry>,
{
    let mut rows = Vec::new();
    for entry in top_level {
        push_subtree(entry, 0, false, &children, &mut rows);
    }
    rows
}

fn push_subtree<'a, F>(
    entry: &'a Entry,
    depth: usize,
    is_last: bool,
    children: &F,
    rows: &mut Vec<FlatRow>,
) where
    F: Fn(&str) -> Vec<&'a Entry>,
{
    rows.push(FlatRow {
        id: entry.id.clone(),
        depth,
        is_last,
    });

    let kids = children(&entry.id);
    let count = kids.len();
    for (idx, child) in kids.into_iter().enumerate() {
        push_subtree(child, depth + 1, idx + 1 == count, children, rows);
    }
}

/// Total tracked time. Only leaves count, since a project's time is the sum
/// of its children.
pub fn compute_total(entries: &[&Entry], now: DateTime<Utc>) -> Duration {
    entries
        .iter()
        .filter(|entry| !entry.is_project())
        .map(|entry| entry.elapsed(now))
        .fold(Duration::zero(), |acc, elapsed| acc + elapsed)
}

/// Get status badge text
pub fn status_badge(entry: &Entry) -> &'static str {
    match entry.kind() {
        EntryKind::Running => "⏱ RUNNING",
        EntryKind::Done => "✓ DONE",
        EntryKind::Project => "▸ PROJECT",
    }
}

/// Get tree connector for child rows
pub fn tree_connector(is_last: bool) -> &'static str {
    if is_last {
        "└─"
    } else {
        "├─"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::archive::TaskArchive;
    use crate::domain::time::parse_instant;
    use pretty_assertions::assert_eq;

    fn create_test_entry(id: &str, start: &str, end: Option<&str>) -> Entry {
        let mut entry = Entry::new(id.to_uppercase(), start.to_string());
        entry.id = id.to_string();
        entry.end_time = end.map(str::to_string);
        entry
    }

    fn create_test_archive() -> TaskArchive {
        let p = "2024-05-01T09:00:00.000Z";
        let mut project = create_test_entry("p", p, Some(p));
        project.sub_entries = vec!["b".to_string(), "a".to_string()];
        let mut a = create_test_entry("a", "2024-05-01T09:00:00Z", Some("2024-05-01T09:30:00Z"));
        a.parent_id = Some("p".to_string());
        let mut b = create_test_entry("b", "2024-05-01T10:00:00Z", Some("2024-05-01T10:15:00Z"));
        b.parent_id = Some("p".to_string());
        let loose = create_test_entry("t", "2024-05-01T11:00:00Z", None);

        TaskArchive::from_entries(vec![project, a, b, loose])
    }

    #[test]
    fn test_flatten_entries_with_children() {
        let archive = create_test_archive();
        let rows = flatten_entries(archive.list_top_level(), |id| archive.list_children(id));

        let shape: Vec<(&str, usize, bool)> = rows
            .iter()
            .map(|r| (r.id.as_str(), r.depth, r.is_last))
            .collect();
        assert_eq!(
            shape,
            vec![("t", 0, false), ("p", 0, false), ("b", 1, false), ("a", 1, true)]
        );
    }

    #[test]
    fn test_flatten_empty() {
        let archive = TaskArchive::new();
        assert!(flatten_entries(archive.list_top_level(), |id| archive.list_children(id)).is_empty());
    }

    #[test]
    fn test_compute_total_skips_projects() {
        let archive = create_test_archive();
        let now = parse_instant("2024-05-01T12:00:00Z").unwrap();
        // a 30m + b 15m + t 60m running
        assert_eq!(compute_total(&archive.list_all(), now), Duration::minutes(105));
    }

    #[test]
    fn test_tree_connector() {
        assert_eq!(tree_connector(false), "├─");
        assert_eq!(tree_connector(true), "└─");
    }

    #[test]
    fn test_status_badge() {
        let archive = create_test_archive();
        assert_eq!(status_badge(archive.get("t").unwrap()), "⏱ RUNNING");
        assert_eq!(status_badge(archive.get("a").unwrap()), "✓ DONE");
        assert_eq!(status_badge(archive.get("p").unwrap()), "▸ PROJECT");
    }
}
