//! Legacy string- and line-addressed operators, kept for backward
//! compatibility with older plans. They run through the same in-memory
//! compose, postcondition, and atomic-write path as the primitives, so
//! a failing legacy step also leaves the file untouched.

use crate::lang::Lang;
use crate::locate::Locator;
use crate::prim::ops::{indent_block, leading_indent, line_end, line_start, PlannedEdit};
use crate::prim::{self, PrimOutcome, RunOptions};
use crate::pool;
use regex::Regex;
use serde_json::{json, Value};

pub const LEGACY_OPS: &[&str] = &[
    "replace_code",
    "insert_code",
    "delete_lines",
    "add_method",
    "add_import",
    "modify_function_signature",
    "rename_symbol",
    "wrap_block",
    "add_class_attribute",
    "replace_function_body",
];

pub fn is_legacy(name: &str) -> bool {
    LEGACY_OPS.contains(&name)
}

/// Required parameters per legacy operator, used by the plan verifier's
/// structural layer.
pub fn required_params(op: &str) -> &'static [&'static str] {
    match op {
        "replace_code" => &["file", "pattern", "replacement"],
        "insert_code" => &["file", "anchor_line", "position", "code"],
        "delete_lines" => &["file", "start_line", "end_line"],
        "add_method" => &["file", "class_name", "method_code"],
        "add_import" => &["file", "import_statement"],
        "modify_function_signature" => &["file", "func_name", "old_signature", "new_signature"],
        "rename_symbol" => &["file", "old_name", "new_name"],
        "wrap_block" => &["file", "start_line", "end_line", "before_code", "after_code"],
        "add_class_attribute" => &["file", "class_name", "attribute_code"],
        "replace_function_body" => &["file", "func_name", "new_body"],
        _ => &[],
    }
}

pub fn execute_legacy(name: &str, params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let Some(file) = params.get("file").and_then(Value::as_str) else {
        return PrimOutcome::failure(format!("{name}: missing parameter 'file'"));
    };
    if file == "all" {
        return PrimOutcome::failure(format!(
            "{name}: file='all' requires explicit file listing"
        ));
    }
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
    };

    let planned = match name {
        "replace_code" => replace_code(&source, params),
        "insert_code" => insert_code(&source, params),
        "delete_lines" => delete_lines(&source, params),
        "add_import" => add_import(&source, params),
        "modify_function_signature" => modify_function_signature(&source, params),
        "rename_symbol" => rename_symbol(&source, params),
        "wrap_block" => wrap_block(&source, params),
        "add_method" => add_method(file, &source, params),
        "add_class_attribute" => add_class_attribute(file, &source, params),
        "replace_function_body" => replace_function_body(file, &source, params),
        other => Err(format!("unknown legacy operator: {other}")),
    };

    match planned {
        Ok(planned) => prim::commit_planned(name, file, planned, opts),
        Err(e) => PrimOutcome::failure(format!("{name}: {e}")),
    }
}

fn str_param<'v>(params: &'v Value, key: &str) -> Result<&'v str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing parameter '{key}'"))
}

fn int_param(params: &Value, key: &str) -> Result<usize, String> {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| format!("missing parameter '{key}'"))
}

fn spliced(source: &str, start: usize, end: usize, text: &str, result: Value) -> PlannedEdit {
    let mut new_content = String::with_capacity(source.len() + text.len());
    new_content.push_str(&source[..start]);
    new_content.push_str(text);
    new_content.push_str(&source[end..]);
    PlannedEdit {
        new_content,
        edit_start: start,
        old_edit_end: end,
        new_edit_end: start + text.len(),
        replaced_kind: None,
        replacement_text: Some(text.to_string()),
        original_span_text: Some(source[start..end].to_string()),
        result,
    }
}

fn replace_code(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let pattern = str_param(params, "pattern")?;
    let replacement = str_param(params, "replacement")?;
    let pos = source
        .find(pattern)
        .ok_or_else(|| format!("pattern not found: {:.80}", pattern))?;
    Ok(spliced(
        source,
        pos,
        pos + pattern.len(),
        replacement,
        json!({ "replaced_at_byte": pos }),
    ))
}

/// Byte offset where the 1-indexed line begins, or None past the end.
fn line_offset(source: &str, line: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for _ in 1..line {
        offset = source[offset..].find('\n').map(|i| offset + i + 1)?;
    }
    Some(offset)
}

fn line_count(source: &str) -> usize {
    source.lines().count()
}

fn insert_code(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let anchor = int_param(params, "anchor_line")?;
    let position = params
        .get("position")
        .and_then(Value::as_str)
        .unwrap_or("after");
    let mut code = str_param(params, "code")?.to_string();
    if !code.ends_with('\n') {
        code.push('\n');
    }

    let total = line_count(source);
    if anchor < 1 || anchor > total {
        return Err(format!("anchor_line {anchor} out of range (1-{total})"));
    }
    let offset = if position == "before" {
        line_offset(source, anchor).unwrap_or(0)
    } else {
        line_offset(source, anchor)
            .map(|o| line_end(source, o))
            .unwrap_or(source.len())
    };
    Ok(spliced(
        source,
        offset,
        offset,
        &code,
        json!({ "inserted_at_line": anchor, "position": position }),
    ))
}

fn delete_lines(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let start = int_param(params, "start_line")?;
    let end = int_param(params, "end_line")?;
    let total = line_count(source);
    if start > end {
        return Err(format!("start_line ({start}) > end_line ({end})"));
    }
    if start < 1 || end > total {
        return Err(format!("line range {start}-{end} out of bounds (1-{total})"));
    }
    let from = line_offset(source, start).unwrap_or(0);
    let to = line_offset(source, end)
        .map(|o| line_end(source, o))
        .unwrap_or(source.len());
    Ok(spliced(
        source,
        from,
        to,
        "",
        json!({ "deleted_start_line": start, "deleted_end_line": end }),
    ))
}

fn add_import(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let mut stmt = str_param(params, "import_statement")?.to_string();
    if !stmt.ends_with('\n') {
        stmt.push('\n');
    }

    // After the last existing import, or at the top of the file.
    let mut offset = 0;
    let mut last_import_end = None;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            last_import_end = Some(offset + line.len());
        }
        offset += line.len();
    }
    let at = last_import_end.unwrap_or(0);
    Ok(spliced(source, at, at, &stmt, json!({ "import": stmt.trim_end() })))
}

fn modify_function_signature(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let old = str_param(params, "old_signature")?;
    let new = str_param(params, "new_signature")?;
    let pos = source
        .find(old)
        .ok_or_else(|| format!("old signature not found: {:.80}", old))?;
    Ok(spliced(
        source,
        pos,
        pos + old.len(),
        new,
        json!({ "modified_at_byte": pos }),
    ))
}

fn rename_symbol(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let old_name = str_param(params, "old_name")?;
    let new_name = str_param(params, "new_name")?;
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(old_name)))
        .map_err(|e| e.to_string())?;
    let count = pattern.find_iter(source).count();
    if count == 0 {
        return Err(format!("symbol '{old_name}' not found"));
    }
    let first = pattern.find(source).map(|m| m.start()).unwrap_or(0);
    let last = pattern
        .find_iter(source)
        .last()
        .map(|m| m.end())
        .unwrap_or(source.len());
    let new_content = pattern.replace_all(source, new_name).into_owned();
    let delta = (new_name.len() as i64 - old_name.len() as i64) * count as i64;

    Ok(PlannedEdit {
        new_content,
        edit_start: first,
        old_edit_end: last,
        new_edit_end: (last as i64 + delta).max(first as i64) as usize,
        replaced_kind: None,
        replacement_text: None,
        original_span_text: None,
        result: json!({ "renamed": old_name, "to": new_name, "occurrences": count }),
    })
}

fn wrap_block(source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let start = int_param(params, "start_line")?;
    let end = int_param(params, "end_line")?;
    let mut before = str_param(params, "before_code")?.to_string();
    let mut after = str_param(params, "after_code")?.to_string();
    if start > end {
        return Err(format!("start_line ({start}) > end_line ({end})"));
    }
    let total = line_count(source);
    if start < 1 || end > total {
        return Err(format!("line range {start}-{end} out of bounds (1-{total})"));
    }
    if !before.ends_with('\n') {
        before.push('\n');
    }
    if !after.ends_with('\n') {
        after.push('\n');
    }

    let from = line_offset(source, start).unwrap_or(0);
    let to = line_offset(source, end)
        .map(|o| line_end(source, o))
        .unwrap_or(source.len());
    let body = indent_block(&source[from..to], "    ");
    let text = format!("{before}{body}{after}");
    Ok(spliced(
        source,
        from,
        to,
        &text,
        json!({ "wrapped_start_line": start, "wrapped_end_line": end }),
    ))
}

/// Resolve a kind/name locator in the given file content.
fn resolve_span(
    file: &str,
    source: &str,
    locator: &Locator,
) -> Result<crate::locate::NodeSpan, String> {
    let lang = Lang::from_path(file).ok_or_else(|| format!("unsupported file type: {file}"))?;
    pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(source)?;
        Ok::<_, crate::parse::ParseError>(
            crate::locate::resolve(locator, &parsed)?.into_iter().next(),
        )
    })
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?
    .ok_or_else(|| format!("node not found: {}", locator.describe()))
}

fn add_method(file: &str, source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let class_name = str_param(params, "class_name")?;
    let method_code = str_param(params, "method_code")?;
    let locator = Locator {
        kind: "class".to_string(),
        name: Some(class_name.to_string()),
        file: file.to_string(),
        ..Default::default()
    };
    let span = resolve_span(file, source, &locator)
        .map_err(|_| format!("class '{class_name}' not found in {file}"))?;

    let at = line_end(source, span.end_byte.saturating_sub(1).max(span.start_byte));
    let text = format!("\n{}", indent_block(method_code, "    "));
    Ok(spliced(
        source,
        at,
        at,
        &text,
        json!({ "class": class_name, "inserted_after_line": span.end_line }),
    ))
}

fn add_class_attribute(file: &str, source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let class_name = str_param(params, "class_name")?;
    let mut attribute_code = str_param(params, "attribute_code")?.to_string();
    if !attribute_code.ends_with('\n') {
        attribute_code.push('\n');
    }
    let locator = Locator {
        kind: "class".to_string(),
        name: Some(class_name.to_string()),
        file: file.to_string(),
        field: Some("body".to_string()),
        nth_child: Some(0),
        ..Default::default()
    };
    let span = resolve_span(file, source, &locator)
        .map_err(|_| format!("class '{class_name}' not found in {file}"))?;

    let at = line_start(source, span.start_byte);
    let indent = leading_indent(source, span.start_byte);
    let text = indent_block(&attribute_code, indent);
    Ok(spliced(
        source,
        at,
        at,
        &text,
        json!({ "class": class_name, "inserted_at_line": span.start_line }),
    ))
}

fn replace_function_body(file: &str, source: &str, params: &Value) -> Result<PlannedEdit, String> {
    let func_name = str_param(params, "func_name")?;
    let new_body = str_param(params, "new_body")?;
    let locator = Locator {
        kind: "function".to_string(),
        name: Some(func_name.to_string()),
        file: file.to_string(),
        field: Some("body".to_string()),
        ..Default::default()
    };
    let span = resolve_span(file, source, &locator)
        .map_err(|_| format!("function '{func_name}' not found in {file}"))?;

    let indent = leading_indent(source, span.start_byte).to_string();
    let text = indent_block(new_body, &indent);
    let text = text.strip_prefix(indent.as_str()).unwrap_or(&text);
    let text = text.trim_end_matches('\n');
    Ok(spliced(
        source,
        span.start_byte,
        span.end_byte,
        text,
        json!({ "function": func_name }),
    ))
}
