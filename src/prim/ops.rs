//! Content builders for the byte-level primitives.
//!
//! Each builder composes the edited file content in memory from the
//! original source plus resolved node spans, and reports the byte
//! region it touched so the post-edit checks know what to compare.

use crate::locate::NodeSpan;
use serde_json::{json, Value};

/// The in-memory outcome of one primitive edit, before verification and
/// before any byte reaches disk.
#[derive(Debug, Clone)]
pub struct PlannedEdit {
    pub new_content: String,
    /// Byte offset where the edit begins (identical in both versions).
    pub edit_start: usize,
    /// End of the edited region in the original content.
    pub old_edit_end: usize,
    /// End of the edited region in the new content.
    pub new_edit_end: usize,
    /// Native kind of the replaced node, when a single node was replaced.
    pub replaced_kind: Option<String>,
    /// Text introduced by the edit.
    pub replacement_text: Option<String>,
    /// Original text of the replaced span.
    pub original_span_text: Option<String>,
    /// Operation-specific result payload.
    pub result: Value,
}

/// Start offset of the line containing `byte`.
pub fn line_start(source: &str, byte: usize) -> usize {
    source[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Offset just past the newline that ends the line containing `byte`
/// (or the end of the source).
pub fn line_end(source: &str, byte: usize) -> usize {
    source[byte..]
        .find('\n')
        .map(|i| byte + i + 1)
        .unwrap_or(source.len())
}

/// Whitespace prefix of the line up to `node_start`.
pub fn leading_indent(source: &str, node_start: usize) -> &str {
    let ls = line_start(source, node_start);
    let segment = &source[ls..node_start];
    let end = segment
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(segment.len());
    &segment[..end]
}

/// Prefix every non-empty line with `indent`; the result ends with a
/// newline.
pub fn indent_block(text: &str, indent: &str) -> String {
    let mut out = String::new();
    for line in text.trim_end_matches('\n').split('\n') {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn splice(source: &str, start: usize, end: usize, text: &str) -> String {
    let mut out = String::with_capacity(source.len() + text.len());
    out.push_str(&source[..start]);
    out.push_str(text);
    out.push_str(&source[end..]);
    out
}

/// Replace a single node's text.
pub fn replace_node(source: &str, span: &NodeSpan, replacement: &str) -> PlannedEdit {
    let new_content = splice(source, span.start_byte, span.end_byte, replacement);
    PlannedEdit {
        new_content,
        edit_start: span.start_byte,
        old_edit_end: span.end_byte,
        new_edit_end: span.start_byte + replacement.len(),
        replaced_kind: Some(span.kind.clone()),
        replacement_text: Some(replacement.to_string()),
        original_span_text: Some(source[span.start_byte..span.end_byte].to_string()),
        result: json!({
            "replaced_start_line": span.start_line,
            "replaced_end_line": span.end_line,
        }),
    }
}

/// Insert code on the line before the anchor node, indented to the
/// anchor's column.
pub fn insert_before(source: &str, span: &NodeSpan, code: &str) -> PlannedEdit {
    let ls = line_start(source, span.start_byte);
    let indent = leading_indent(source, span.start_byte);
    let insert = indent_block(code, indent);
    let new_content = splice(source, ls, ls, &insert);
    PlannedEdit {
        new_content,
        edit_start: ls,
        old_edit_end: ls,
        new_edit_end: ls + insert.len(),
        replaced_kind: None,
        replacement_text: Some(code.to_string()),
        original_span_text: None,
        result: json!({ "inserted_at_line": span.start_line }),
    }
}

/// Insert code on the line after the anchor node, indented to the
/// anchor's column. `separator` is emitted verbatim before the code
/// (e.g. `"\n"` for a separating blank line).
pub fn insert_after(source: &str, span: &NodeSpan, code: &str, separator: &str) -> PlannedEdit {
    let le = line_end(source, span.end_byte.saturating_sub(1).max(span.start_byte));
    let indent = leading_indent(source, span.start_byte);
    let mut insert = String::from(separator);
    insert.push_str(&indent_block(code, indent));
    let new_content = splice(source, le, le, &insert);
    PlannedEdit {
        new_content,
        edit_start: le,
        old_edit_end: le,
        new_edit_end: le + insert.len(),
        replaced_kind: None,
        replacement_text: Some(code.to_string()),
        original_span_text: None,
        result: json!({ "inserted_after_line": span.end_line }),
    }
}

/// Delete a node. When the node is alone on its line(s) the whole lines
/// go; otherwise only the node's bytes.
pub fn delete_node(source: &str, span: &NodeSpan) -> PlannedEdit {
    let ls = line_start(source, span.start_byte);
    let le = line_end(source, span.end_byte.saturating_sub(1).max(span.start_byte));

    let only_ws_before = source[ls..span.start_byte]
        .chars()
        .all(|c| c == ' ' || c == '\t');
    let nothing_after = source[span.end_byte..le].trim().is_empty();

    let (start, end) = if only_ws_before && nothing_after {
        (ls, le)
    } else {
        (span.start_byte, span.end_byte)
    };

    PlannedEdit {
        new_content: splice(source, start, end, ""),
        edit_start: start,
        old_edit_end: end,
        new_edit_end: start,
        replaced_kind: None,
        replacement_text: None,
        original_span_text: Some(source[span.start_byte..span.end_byte].to_string()),
        result: json!({
            "deleted_start_line": span.start_line,
            "deleted_end_line": span.end_line,
        }),
    }
}

/// Wrap a node's full lines with before/after text; the wrapped span is
/// indented four columns deeper when `indent_body` is set.
pub fn wrap_node(
    source: &str,
    span: &NodeSpan,
    before: &str,
    after: &str,
    indent_body: bool,
) -> PlannedEdit {
    let ls = line_start(source, span.start_byte);
    let le = line_end(source, span.end_byte.saturating_sub(1).max(span.start_byte));
    let indent = leading_indent(source, span.start_byte);

    let body_src = &source[ls..le];
    let body = if indent_body {
        indent_block(body_src, "    ")
    } else {
        let mut b = body_src.to_string();
        if !b.ends_with('\n') {
            b.push('\n');
        }
        b
    };

    let mut wrapped = String::new();
    if !before.trim().is_empty() {
        wrapped.push_str(&indent_block(before, indent));
    }
    wrapped.push_str(&body);
    if !after.trim().is_empty() {
        wrapped.push_str(&indent_block(after, indent));
    }

    PlannedEdit {
        new_content: splice(source, ls, le, &wrapped),
        edit_start: ls,
        old_edit_end: le,
        new_edit_end: ls + wrapped.len(),
        replaced_kind: None,
        replacement_text: Some(format!("{before}\n{after}")),
        original_span_text: Some(body_src.to_string()),
        result: json!({
            "wrapped_start_line": span.start_line,
            "wrapped_end_line": span.end_line,
        }),
    }
}

/// Replace every span with the same text, walking matches in descending
/// start-byte order so earlier offsets stay valid.
pub fn replace_all(source: &str, spans: &[NodeSpan], replacement: &str) -> PlannedEdit {
    let mut ordered: Vec<&NodeSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| b.start_byte.cmp(&a.start_byte));

    let mut content = source.to_string();
    for span in &ordered {
        content = splice(&content, span.start_byte, span.end_byte, replacement);
    }

    let edit_start = ordered.iter().map(|s| s.start_byte).min().unwrap_or(0);
    let old_edit_end = ordered.iter().map(|s| s.end_byte).max().unwrap_or(0);
    let delta: i64 = ordered
        .iter()
        .map(|s| replacement.len() as i64 - (s.end_byte - s.start_byte) as i64)
        .sum();

    PlannedEdit {
        new_content: content,
        edit_start,
        old_edit_end,
        new_edit_end: (old_edit_end as i64 + delta).max(edit_start as i64) as usize,
        replaced_kind: None,
        replacement_text: None,
        original_span_text: None,
        result: json!({ "replaced_count": ordered.len() }),
    }
}
