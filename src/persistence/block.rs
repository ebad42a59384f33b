use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// The archive block: a ```json fence whose markers each start a line. The
/// body may be empty. Non-greedy so only the first block in the document is
/// ever matched, on load and on save alike.
const BLOCK_PATTERN: &str = r"(?msR)^```json[ \t]*\r?\n(.*?)^```[ \t]*$";

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BLOCK_PATTERN).expect("block pattern is valid"))
}

/// A located archive block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// Byte range of the whole fence, markers included
    pub range: Range<usize>,
    /// Text between the fence lines
    pub payload: &'a str,
}

/// Find the first archive block in a document
pub fn find_block(document: &str) -> Option<Block<'_>> {
    let captures = block_regex().captures(document)?;
    let whole = captures.get(0)?;
    let body = captures.get(1).map_or("", |m| m.as_str());
    let body = body.strip_suffix('\n').unwrap_or(body);
    Some(Block {
        range: whole.range(),
        payload: body.strip_suffix('\r').unwrap_or(body),
    })
}

/// Wrap a payload in the fence markers
pub fn render_block(payload: &str) -> String {
    format!("```json\n{}\n```", payload)
}

/// Put `payload` into a document: replace the existing block in place, or
/// append a new one. Bytes outside the block are left untouched.
pub fn write_block(document: Option<&str>, payload: &str) -> String {
    let block = render_block(payload);

    let Some(document) = document else {
        return format!("{}\n", block);
    };

    if let Some(existing) = find_block(document) {
        let mut output = String::with_capacity(document.len() + block.len());
        output.push_str(&document[..existing.range.start]);
        output.push_str(&block);
        output.push_str(&document[existing.range.end..]);
        return output;
    }

    let mut output = document.to_string();
    if !output.is_empty() {
        output.push_str(if output.ends_with('\n') { "\n" } else { "\n\n" });
    }
    output.push_str(&block);
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_block() {
        let doc = "# Log\n\n```json\n{\"entries\":[]}\n```\n\nnotes\n";
        let block = find_block(doc).unwrap();
        assert_eq!(block.payload, "{\"entries\":[]}");
        assert_eq!(&doc[block.range.clone()], "```json\n{\"entries\":[]}\n```");
    }

    #[test]
    fn test_find_block_first_only() {
        let doc = "```json\n1\n```\nmiddle\n```json\n2\n```\n";
        assert_eq!(find_block(doc).unwrap().payload, "1");
    }

    #[test]
    fn test_find_block_crlf() {
        let doc = "a\r\n```json\r\n[]\r\n```\r\n";
        assert_eq!(find_block(doc).unwrap().payload, "[]");
    }

    #[test]
    fn test_find_empty_block() {
        let doc = "notes\n```json\n```\nmore\n";
        let block = find_block(doc).unwrap();
        assert_eq!(block.payload, "");
        assert_eq!(&doc[block.range.clone()], "```json\n```");

        let doc = "```json\n```\nx\n```json\n1\n```\n";
        let block = find_block(doc).unwrap();
        assert_eq!(block.payload, "");
        assert_eq!(block.range, 0..11);
    }

    #[test]
    fn test_fences_must_start_a_line() {
        let doc = "inline ```json\nx\n``` text\n";
        assert!(find_block(doc).is_none());

        let doc = "```json\nsee ``` here\n```\n";
        assert_eq!(find_block(doc).unwrap().payload, "see ``` here");
    }

    #[test]
    fn test_write_block_fills_empty_block() {
        let written = write_block(Some("notes\n```json\n```\nafter\n"), "{}");
        assert_eq!(written, "notes\n```json\n{}\n```\nafter\n");
    }

    #[test]
    fn test_no_block() {
        assert!(find_block("just notes\n```rust\nfn main() {}\n```\n").is_none());
        assert!(find_block("").is_none());
    }

    #[test]
    fn test_write_block_replaces_in_place() {
        let doc = "before\n```json\nold\n```\nafter\n```json\nsecond\n```\n";
        let written = write_block(Some(doc), "new");
        assert_eq!(written, "before\n```json\nnew\n```\nafter\n```json\nsecond\n```\n");
    }

    #[test]
    fn test_write_block_appends_when_missing() {
        assert_eq!(write_block(Some("notes"), "x"), "notes\n\n```json\nx\n```\n");
        assert_eq!(write_block(Some("notes\n"), "x"), "notes\n\n```json\nx\n```\n");
        assert_eq!(write_block(Some(""), "x"), "```json\nx\n```\n");
        assert_eq!(write_block(None, "x"), "```json\nx\n```\n");
    }
}
