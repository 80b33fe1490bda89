//! Tier-1 AST surgery: move, copy, swap, rename, reorder, delete over
//! existing subtrees. No code generation — surgery only rearranges text
//! that already exists, which is what makes it fully verifiable.

use crate::edit::{apply_all, Edit, FileSnapshot};
use crate::lang::Lang;
use crate::locate::{Locator, NodeSpan};
use crate::pool;
use crate::prim::ops::PlannedEdit;
use crate::prim::{self, PrimOutcome, RunOptions};
use crate::template::validate::is_identifier;
use serde_json::{json, Value};
use tracing::debug;

/// Execute a Tier-1 surgery step.
pub fn execute_surgery(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let Some(op) = step.get("op").and_then(Value::as_str) else {
        return PrimOutcome::failure("surgery step has no 'op'");
    };
    debug!(op, "surgery dispatch");
    match op {
        "rename_identifier" => rename_identifier(step, opts),
        "delete_node" => delete_node(step, opts),
        "copy_node" => copy_node(step, opts),
        "move_node" => move_node(step, opts),
        "swap_nodes" => swap_nodes(step, opts),
        "reorder_children" => reorder_children(step, opts),
        other => PrimOutcome::failure(format!("unknown surgery operator: {other}")),
    }
}

fn locator_at(step: &Value, key: &str) -> Result<Locator, String> {
    let raw = step
        .get(key)
        .cloned()
        .ok_or_else(|| format!("surgery step requires '{key}' locator"))?;
    serde_json::from_value(raw).map_err(|e| format!("invalid '{key}' locator: {e}"))
}

/// Resolve the first node for a locator, returning its span and text.
fn span_and_text(locator: &Locator) -> Result<(String, NodeSpan, String), String> {
    let file = locator.file.clone();
    if file.is_empty() {
        return Err("locator must name a file".to_string());
    }
    let lang = Lang::from_path(&file).ok_or_else(|| format!("unsupported file type: {file}"))?;
    let source = std::fs::read_to_string(&file).map_err(|e| format!("cannot read {file}: {e}"))?;
    let span = pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(&source)?;
        Ok::<_, crate::parse::ParseError>(
            crate::locate::resolve(locator, &parsed)?.into_iter().next(),
        )
    })
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?
    .ok_or_else(|| format!("node not found: {}", locator.describe()))?;
    let text = source[span.start_byte..span.end_byte].to_string();
    Ok((source, span, text))
}

fn rename_identifier(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let target = match locator_at(step, "target") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let Some(new_name) = step.get("new_name").and_then(Value::as_str) else {
        return PrimOutcome::failure("rename_identifier requires 'new_name'");
    };
    if let Some(lang) = Lang::from_path(&target.file) {
        if !is_identifier(lang, new_name) {
            return PrimOutcome::failure(format!(
                "'{new_name}' is not a valid identifier for {}",
                lang.name()
            ));
        }
    }

    let mut params = json!({
        "locator": target,
        "replacement": new_name,
    });
    if let Some(filter) = step.get("filter") {
        params["filter"] = filter.clone();
    }
    let outcome = prim::execute_primitive("replace_all_matching", &params, opts);
    if !outcome.success
        && outcome
            .error
            .as_deref()
            .is_some_and(|e| e.contains("after filtering"))
    {
        return PrimOutcome::failure("no eligible occurrences");
    }
    outcome
}

fn delete_node(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let target = match locator_at(step, "target") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    prim::execute_primitive("delete_node", &json!({ "locator": target }), opts)
}

fn copy_node(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let target = match locator_at(step, "target") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let source_loc = match locator_at(step, "source") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let (_, _, text) = match span_and_text(&source_loc) {
        Ok(t) => t,
        Err(e) => return PrimOutcome::failure(format!("copy_node: {e}")),
    };
    let params = json!({
        "locator": target,
        "code": text,
        "separator": "\n",
    });
    prim::execute_primitive("insert_after_node", &params, opts)
}

fn move_node(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let target = match locator_at(step, "target") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let source_loc = match locator_at(step, "source") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let (_, _, text) = match span_and_text(&source_loc) {
        Ok(t) => t,
        Err(e) => return PrimOutcome::failure(format!("move_node: {e}")),
    };

    let source_snapshot = match FileSnapshot::capture(&source_loc.file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(e.to_string()),
    };
    let target_snapshot = if target.file != source_loc.file {
        match FileSnapshot::capture(&target.file) {
            Ok(s) => Some(s),
            Err(e) => return PrimOutcome::failure(e.to_string()),
        }
    } else {
        None
    };

    let deleted = prim::execute_primitive(
        "delete_node",
        &json!({ "locator": source_loc }),
        opts,
    );
    if !deleted.success {
        return deleted;
    }

    let inserted = prim::execute_primitive(
        "insert_after_node",
        &json!({ "locator": target, "code": text, "separator": "\n" }),
        opts,
    );
    if !inserted.success {
        let _ = source_snapshot.restore();
        if let Some(snapshot) = &target_snapshot {
            let _ = snapshot.restore();
        }
        return PrimOutcome {
            rolled_back: Some(true),
            ..inserted
        };
    }

    PrimOutcome {
        success: true,
        warnings: [deleted.warnings, inserted.warnings].concat(),
        result: Some(json!({ "moved": text.len() })),
        ..Default::default()
    }
}

fn swap_nodes(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let target = match locator_at(step, "target") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let source_loc = match locator_at(step, "source") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };

    if target.file == source_loc.file {
        // Same file: one atomic commit with both spans rewritten.
        let (content, a_span, a_text) = match span_and_text(&target) {
            Ok(t) => t,
            Err(e) => return PrimOutcome::failure(format!("swap_nodes: {e}")),
        };
        let (_, b_span, b_text) = match span_and_text(&source_loc) {
            Ok(t) => t,
            Err(e) => return PrimOutcome::failure(format!("swap_nodes: {e}")),
        };
        if a_span == b_span {
            return PrimOutcome::failure("swap_nodes: target and source are the same node");
        }

        let edits = vec![
            Edit::new(&target.file, a_span.start_byte, a_span.end_byte, b_text.clone(), a_text.clone()),
            Edit::new(&target.file, b_span.start_byte, b_span.end_byte, a_text.clone(), b_text.clone()),
        ];
        let new_content = match apply_all(&content, edits) {
            Ok(c) => c,
            Err(e) => return PrimOutcome::failure(format!("swap_nodes: {e}")),
        };

        let edit_start = a_span.start_byte.min(b_span.start_byte);
        let old_edit_end = a_span.end_byte.max(b_span.end_byte);
        let planned = PlannedEdit {
            new_content,
            edit_start,
            old_edit_end,
            // Equal total length: two spans exchanged text.
            new_edit_end: old_edit_end,
            replaced_kind: None,
            replacement_text: None,
            original_span_text: None,
            result: json!({ "swapped": [a_span.start_line, b_span.start_line] }),
        };
        return prim::commit_planned("swap_nodes", &target.file, planned, opts);
    }

    // Cross-file swap: two commits under snapshots.
    let (_, _, a_text) = match span_and_text(&target) {
        Ok(t) => t,
        Err(e) => return PrimOutcome::failure(format!("swap_nodes: {e}")),
    };
    let (_, _, b_text) = match span_and_text(&source_loc) {
        Ok(t) => t,
        Err(e) => return PrimOutcome::failure(format!("swap_nodes: {e}")),
    };
    let snap_a = match FileSnapshot::capture(&target.file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(e.to_string()),
    };
    let snap_b = match FileSnapshot::capture(&source_loc.file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(e.to_string()),
    };

    let run = RunOptions {
        expect_kind_change: true,
        ..opts
    };
    let first = prim::execute_primitive(
        "replace_node",
        &json!({ "locator": &target, "replacement": b_text }),
        run,
    );
    if !first.success {
        return first;
    }
    let second = prim::execute_primitive(
        "replace_node",
        &json!({ "locator": &source_loc, "replacement": a_text }),
        run,
    );
    if !second.success {
        let _ = snap_a.restore();
        let _ = snap_b.restore();
        return PrimOutcome {
            rolled_back: Some(true),
            ..second
        };
    }

    PrimOutcome {
        success: true,
        warnings: [first.warnings, second.warnings].concat(),
        result: Some(json!({ "swapped_files": [target.file, source_loc.file] })),
        ..Default::default()
    }
}

fn reorder_children(step: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let parent = match locator_at(step, "parent") {
        Ok(l) => l,
        Err(e) => return PrimOutcome::failure(e),
    };
    let Some(order) = step.get("order").and_then(Value::as_array) else {
        return PrimOutcome::failure("reorder_children requires 'order' list");
    };
    let order: Vec<usize> = match order
        .iter()
        .map(|v| v.as_u64().map(|n| n as usize))
        .collect::<Option<Vec<_>>>()
    {
        Some(o) => o,
        None => return PrimOutcome::failure("'order' must be a list of non-negative integers"),
    };

    let file = parent.file.clone();
    let Some(lang) = Lang::from_path(&file) else {
        return PrimOutcome::failure(format!("unsupported file type: {file}"));
    };
    let source = match std::fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
    };

    let spans = pool::with_parser(lang, |p| -> Result<Option<Vec<NodeSpan>>, crate::parse::ParseError> {
        let parsed = p.parse_with_source(&source)?;
        let Some(node) = crate::locate::resolve_nodes(&parent, &parsed)?.into_iter().next() else {
            return Ok(None);
        };
        let mut cursor = node.walk();
        let children = node
            .children(&mut cursor)
            .filter(|c| c.is_named() && !crate::lang::is_comment_kind(c.kind()))
            .map(NodeSpan::of)
            .collect();
        Ok(Some(children))
    });

    let spans = match spans {
        Ok(Ok(Some(s))) => s,
        Ok(Ok(None)) => {
            return PrimOutcome::failure(format!("node not found: {}", parent.describe()))
        }
        Ok(Err(e)) | Err(e) => return PrimOutcome::failure(e.to_string()),
    };

    if spans.is_empty() {
        return PrimOutcome::failure("reorder_children: parent has no reorderable children");
    }

    // `order` must be a permutation of 0..n.
    let mut sorted = order.clone();
    sorted.sort_unstable();
    if sorted != (0..spans.len()).collect::<Vec<_>>() {
        return PrimOutcome::failure(format!(
            "'order' must be a permutation of 0..{} (got {order:?})",
            spans.len()
        ));
    }

    // Re-emit children in the permuted order, preserving the original
    // separator text between them.
    let region_start = spans[0].start_byte;
    let region_end = spans[spans.len() - 1].end_byte;
    let mut text = String::new();
    for (i, &child_index) in order.iter().enumerate() {
        let span = &spans[child_index];
        text.push_str(&source[span.start_byte..span.end_byte]);
        if i + 1 < spans.len() {
            let sep_start = spans[i].end_byte;
            let sep_end = spans[i + 1].start_byte;
            text.push_str(&source[sep_start..sep_end]);
        }
    }

    let mut new_content = String::with_capacity(source.len());
    new_content.push_str(&source[..region_start]);
    new_content.push_str(&text);
    new_content.push_str(&source[region_end..]);

    let planned = PlannedEdit {
        new_content,
        edit_start: region_start,
        old_edit_end: region_end,
        new_edit_end: region_start + text.len(),
        replaced_kind: None,
        replacement_text: None,
        original_span_text: None,
        result: json!({ "reordered": order }),
    };
    prim::commit_planned("reorder_children", &file, planned, opts)
}
