use super::parser::LegacyNode;
use crate::domain::entry::default_name;
use crate::domain::{Entry, DEFAULT_NAME_PREFIX};
use regex::Regex;
use std::sync::OnceLock;

/// Names starting with this marker ("Part 1", "part 2") carry no label of
/// their own and inherit the nearest named ancestor's.
const CONTINUATION_PATTERN: &str = r"(?i)^part\b";

fn continuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONTINUATION_PATTERN).expect("continuation pattern is valid"))
}

/// Whether a legacy name should be replaced by an inherited label
pub fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || continuation_regex().is_match(name)
}

/// Flatten a legacy tree into top-level entries with fresh ids.
///
/// Only leaves become entries. Branch nodes contribute their name as the
/// label for placeholder-named leaves below them.
pub fn flatten_legacy(nodes: &[LegacyNode]) -> Vec<Entry> {
    let mut entries = Vec::new();
    for node in nodes {
        flatten_node(node, None, &mut entries);
    }
    entries
}

fn flatten_node(node: &LegacyNode, inherited: Option<&str>, entries: &mut Vec<Entry>) {
    let own = node.name.trim();
    let label = if is_placeholder_name(own) {
        inherited
    } else {
        Some(own)
    };

    let children = node.children();
    if !children.is_empty() {
        for child in children {
            flatten_node(child, label, entries);
        }
        return;
    }

    let name = match label {
        Some(label) => label.to_string(),
        None if !own.is_empty() => own.to_string(),
        None => default_name(DEFAULT_NAME_PREFIX, entries.len()),
    };

    let mut entry = Entry::new(name, node.start_time.clone());
    entry.end_time = node
        .end_time
        .as_deref()
        .filter(|end| !end.trim().is_empty())
        .map(str::to_string);
    entry.reclassify();
    entries.push(entry);
}
