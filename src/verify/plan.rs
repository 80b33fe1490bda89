//! The static plan verifier: seven layers executed before any byte is
//! written. All errors and warnings are collected in a single pass so
//! one revision can address every problem.
//!
//! - Layer 0: structural (known operator, required params, files exist)
//! - Layer 0b: locator preconditions against the current trees
//! - Layer 1: content/pattern existence with fuzzy fallback
//! - Layer 2: line-drift analysis for line-addressed legacy steps
//! - Layer 3: AST context of pattern matches (strings/comments)
//! - Layer 4: symbol-occurrence classification for renames
//! - Layer 5: preflight syntax of simulated replacements (blocking)
//! - Layer 6: cross-file impact via the import graph

use crate::dsl::{self, CustomOp};
use crate::graph::Graph;
use crate::lang::{is_comment_kind, is_string_kind, is_string_or_comment_kind, Lang, NormKind};
use crate::legacy;
use crate::locate::Locator;
use crate::plan::{detect_tier, parse_plan, Tier};
use crate::pool;
use crate::prim;
use crate::template;
use serde::Serialize;
use serde_json::Value;
use similar::TextDiff;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default, Serialize)]
pub struct PlanReport {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Verify a plan document against the current file system and a
/// prebuilt graph.
pub fn verify_plan(plan_doc: &Value, graph: &Graph) -> PlanReport {
    let mut report = PlanReport::default();

    let (custom_ops, steps) = match parse_plan(plan_doc) {
        Ok(parts) => parts,
        Err(e) => {
            report.errors.push(e);
            return report;
        }
    };

    for (i, step) in steps.iter().enumerate() {
        verify_step(i, step, &custom_ops, &mut report);
    }

    // Layer 2: cumulative line drift across legacy steps.
    let legacy_steps: Vec<(usize, &Value)> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.get("op")
                .and_then(Value::as_str)
                .is_some_and(legacy::is_legacy)
        })
        .collect();
    check_line_drift(&legacy_steps, &mut report);

    // Layer 6: cross-file impact.
    check_cross_file_impact(&steps, graph, &mut report);

    report.passed = report.errors.is_empty();
    debug!(
        passed = report.passed,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "plan verification complete"
    );
    report
}

fn op_of(step: &Value) -> &str {
    step.get("op").and_then(Value::as_str).unwrap_or("")
}

fn params_of(step: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    step.get("params").unwrap_or(&EMPTY)
}

fn verify_step(i: usize, step: &Value, custom_ops: &[CustomOp], report: &mut PlanReport) {
    let tier = detect_tier(step);
    let op = op_of(step);
    let params = params_of(step);

    // === Layer 0: structural checks ===
    match tier {
        Tier::Surgery => {}
        Tier::Template => {
            let name = step.get("template").and_then(Value::as_str).unwrap_or("");
            let Some(tmpl) = template::lookup(name) else {
                report.errors.push(format!("Step {i}: Unknown template '{name}'"));
                return;
            };
            for slot in tmpl.params {
                if slot.required && slot.default.is_none() && params.get(slot.name).is_none() {
                    report.errors.push(format!(
                        "Step {i} (template={name}): Missing parameter '{}'",
                        slot.name
                    ));
                }
            }
        }
        Tier::Fragment => {
            if let Some(frag) = step.get("fragment") {
                match serde_json::from_value::<crate::fragment::Fragment>(frag.clone()) {
                    Ok(frag) => {
                        for e in crate::fragment::validate_fragment(&frag) {
                            report.errors.push(format!("Step {i} (fragment): {e}"));
                        }
                    }
                    Err(e) => report
                        .errors
                        .push(format!("Step {i}: invalid fragment: {e}")),
                }
            }
        }
        Tier::Other => {
            let is_custom = custom_ops.iter().any(|c| c.define == op);
            let known = prim::is_primitive(op)
                || dsl::is_builtin_composed(op)
                || legacy::is_legacy(op)
                || is_custom;
            if !known {
                report.errors.push(format!("Step {i}: Unknown operator '{op}'"));
                return;
            }
            if legacy::is_legacy(op) {
                for param in legacy::required_params(op) {
                    if params.get(param).is_none() {
                        report.errors.push(format!(
                            "Step {i}: Missing parameter '{param}' for {op}"
                        ));
                    }
                }
            }
        }
    }

    // Files named anywhere in the step must exist.
    let files = step_files(step);
    for file in &files {
        if file != "all" && !std::path::Path::new(file).is_file() {
            report
                .errors
                .push(format!("Step {i}: File '{file}' does not exist"));
            return;
        }
    }

    // === Layer 0b: locator preconditions ===
    for locator in step_locators(step) {
        if locator.file.is_empty() {
            continue;
        }
        let Some((count, unique_needed)) = locator_match_count(&locator, op) else {
            continue;
        };
        if count == 0 {
            report.errors.push(format!(
                "Step {i} ({}): Locator matched 0 nodes: {}",
                display_op(step),
                locator.describe()
            ));
        } else if count > 1 && locator.index.is_none() && unique_needed {
            report.warnings.push(format!(
                "Step {i} ({}): Locator matched {count} nodes (use 'index' to disambiguate): {}",
                display_op(step),
                locator.describe()
            ));
        }
    }

    // === Layers 1/3/5: content checks for legacy string operators ===
    let file = files.first().cloned().unwrap_or_default();
    if file.is_empty() || file == "all" {
        return;
    }
    let Ok(content) = std::fs::read_to_string(&file) else {
        return;
    };

    match op {
        "replace_code" => {
            let pattern = params.get("pattern").and_then(Value::as_str).unwrap_or("");
            if pattern.is_empty() {
                return;
            }
            if let Some(pos) = content.find(pattern) {
                // Layer 3: is the match inside a string or comment?
                if let Some(warning) = pattern_context_warning(&file, &content, pos) {
                    report.warnings.push(format!("Step {i} (replace_code): {warning}"));
                }
                // Layer 5: preflight the simulated replacement.
                let replacement = params
                    .get("replacement")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let simulated = content.replacen(pattern, replacement, 1);
                if let Some(lang) = Lang::from_path(&file) {
                    let broken = pool::with_parser(lang, |p| {
                        p.parse_with_source(&simulated)
                            .map(|t| !t.parses_ok())
                            .unwrap_or(true)
                    })
                    .unwrap_or(false);
                    if broken {
                        report.errors.push(format!(
                            "Step {i} (replace_code): Replacement produces syntax error in {file}"
                        ));
                    }
                }
            } else {
                // Layer 1: fuzzy fallback.
                match fuzzy_find(&content, pattern, 0.8) {
                    Some((ratio, matched)) => {
                        let preview: String = matched.chars().take(60).collect();
                        report.warnings.push(format!(
                            "Step {i} (replace_code): Pattern not found exactly, but {:.0}% similar match found: {preview:?}",
                            ratio * 100.0
                        ));
                    }
                    None => {
                        let preview: String = pattern.chars().take(80).collect();
                        report.errors.push(format!(
                            "Step {i} (replace_code): Pattern not found in {file}: {preview:?}"
                        ));
                    }
                }
            }
        }
        "modify_function_signature" => {
            let old = params
                .get("old_signature")
                .and_then(Value::as_str)
                .unwrap_or("");
            if !old.is_empty() && !content.contains(old) {
                let preview: String = old.chars().take(80).collect();
                report.errors.push(format!(
                    "Step {i} (modify_function_signature): Old signature not found in {file}: {preview:?}"
                ));
            }
        }
        "rename_symbol" => {
            let old_name = params.get("old_name").and_then(Value::as_str).unwrap_or("");
            if old_name.is_empty() {
                return;
            }
            let pattern = regex::Regex::new(&format!(r"\b{}\b", regex::escape(old_name)));
            if let Ok(pattern) = pattern {
                if !pattern.is_match(&content) {
                    report.errors.push(format!(
                        "Step {i} (rename_symbol): Symbol '{old_name}' not found in {file}"
                    ));
                    return;
                }
            }
            // Layer 4: classify occurrences.
            if let Some(counts) = classify_occurrences(&file, &content, old_name) {
                if counts.in_strings > 0 || counts.in_comments > 0 {
                    report.warnings.push(format!(
                        "Step {i} (rename_symbol): '{old_name}' also appears in strings ({}x) and comments ({}x); a textual rename will change these too",
                        counts.in_strings, counts.in_comments
                    ));
                }
            }
        }
        "add_import" => {
            let stmt = params
                .get("import_statement")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            if !stmt.is_empty() && content.contains(stmt) {
                let preview: String = stmt.chars().take(80).collect();
                report.warnings.push(format!(
                    "Step {i} (add_import): Import already exists in {file}: {preview:?}"
                ));
            }
        }
        "add_method" => {
            let method_code = params
                .get("method_code")
                .and_then(Value::as_str)
                .unwrap_or("");
            if let Some(name) = extract_callable_name(method_code) {
                let pattern =
                    regex::Regex::new(&format!(r"\bdef\s+{}\s*\(", regex::escape(&name)));
                if pattern.map(|p| p.is_match(&content)).unwrap_or(false) {
                    report.warnings.push(format!(
                        "Step {i} (add_method): Method '{name}' may already exist in {file}"
                    ));
                }
            }
        }
        "insert_code" => {
            if let Some(anchor) = params.get("anchor_line").and_then(Value::as_u64) {
                let total = content.lines().count() as u64;
                if anchor < 1 || anchor > total {
                    report.errors.push(format!(
                        "Step {i} (insert_code): anchor_line {anchor} out of range (1-{total})"
                    ));
                }
            }
        }
        "delete_lines" | "wrap_block" => {
            let start = params.get("start_line").and_then(Value::as_u64).unwrap_or(0);
            let end = params.get("end_line").and_then(Value::as_u64).unwrap_or(0);
            if start > end {
                report.errors.push(format!(
                    "Step {i} ({op}): start_line ({start}) > end_line ({end})"
                ));
            }
        }
        _ => {}
    }
}

fn display_op(step: &Value) -> String {
    if let Some(op) = step.get("op").and_then(Value::as_str) {
        return op.to_string();
    }
    if let Some(t) = step.get("template").and_then(Value::as_str) {
        return format!("template={t}");
    }
    if step.get("fragment").is_some() {
        return "fragment".to_string();
    }
    "step".to_string()
}

/// Every file a step references.
fn step_files(step: &Value) -> Vec<String> {
    let mut files = BTreeSet::new();
    for locator in step_locators(step) {
        if !locator.file.is_empty() {
            files.insert(locator.file);
        }
    }
    if let Some(f) = params_of(step).get("file").and_then(Value::as_str) {
        if !f.is_empty() {
            files.insert(f.to_string());
        }
    }
    files.into_iter().collect()
}

/// Every locator a step carries: `params.locator`, surgery
/// `target`/`source`/`parent`, fragment `target`, and template locator
/// parameters.
fn step_locators(step: &Value) -> Vec<Locator> {
    let mut out = Vec::new();
    let mut push = |value: Option<&Value>| {
        if let Some(v) = value {
            if v.is_object() {
                if let Ok(loc) = serde_json::from_value::<Locator>(v.clone()) {
                    out.push(loc);
                }
            }
        }
    };

    push(params_of(step).get("locator"));
    push(step.get("target"));
    push(step.get("source"));
    push(step.get("parent"));

    if let Some(name) = step.get("template").and_then(Value::as_str) {
        if let Some(tmpl) = template::lookup(name) {
            for slot in tmpl.params {
                if matches!(slot.kind, template::ParamKind::Locator) {
                    push(params_of(step).get(slot.name));
                }
            }
        }
    }
    out
}

/// Resolve a locator against the current tree; returns the match count
/// and whether the owning operation demands a unique match.
fn locator_match_count(locator: &Locator, op: &str) -> Option<(usize, bool)> {
    let lang = Lang::from_path(&locator.file)?;
    let source = std::fs::read_to_string(&locator.file).ok()?;
    let count = pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(&source)?;
        Ok::<_, crate::parse::ParseError>(crate::locate::resolve_nodes(locator, &parsed)?.len())
    })
    .ok()?
    .ok()?;
    let unique_needed = matches!(
        op,
        "replace_node" | "delete_node" | "wrap_node" | "swap_nodes" | "move_node"
    );
    Some((count, unique_needed))
}

/// Layer 1 helper: closest fuzzy match for a pattern, line-based sliding
/// window with a character window fallback for short patterns.
fn fuzzy_find(content: &str, pattern: &str, threshold: f32) -> Option<(f32, String)> {
    if pattern.is_empty() || content.is_empty() {
        return None;
    }

    let mut best_ratio = 0.0f32;
    let mut best_match = String::new();

    let pattern_lines: Vec<&str> = pattern.lines().collect();
    let n = pattern_lines.len();

    if n > 1 || pattern.len() >= 200 {
        let content_lines: Vec<&str> = content.lines().collect();
        if content_lines.len() < n {
            return None;
        }
        for window in content_lines.windows(n) {
            let window_text = window.join("\n");
            let ratio = TextDiff::from_chars(pattern, window_text.as_str()).ratio();
            if ratio > best_ratio {
                best_ratio = ratio;
                best_match = window_text;
            }
        }
    } else {
        let plen = pattern.len();
        let step = (plen / 4).max(1);
        let mut start = 0;
        while start < content.len() {
            let end = (start + plen + plen / 4).min(content.len());
            if let Some(window) = content.get(start..end) {
                let ratio = TextDiff::from_chars(pattern, window).ratio();
                if ratio > best_ratio {
                    best_ratio = ratio;
                    best_match = window.to_string();
                }
            }
            start += step;
        }
    }

    if best_ratio >= threshold {
        Some((best_ratio, best_match))
    } else {
        None
    }
}

/// Layer 3 helper: warn when a byte position falls inside a string or
/// comment node.
fn pattern_context_warning(file: &str, content: &str, offset: usize) -> Option<String> {
    let lang = Lang::from_path(file)?;
    pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(content).ok()?;
        let mut node = parsed
            .root_node()
            .descendant_for_byte_range(offset, offset + 1)?;
        loop {
            if is_string_or_comment_kind(node.kind()) {
                return Some(format!(
                    "Pattern match at offset {offset} is inside a {} node (may not be actual code)",
                    node.kind()
                ));
            }
            node = node.parent()?;
        }
    })
    .ok()
    .flatten()
}

struct OccurrenceCounts {
    definitions: usize,
    references: usize,
    in_strings: usize,
    in_comments: usize,
}

/// Layer 4 helper: classify every occurrence of a symbol in a file.
fn classify_occurrences(file: &str, content: &str, name: &str) -> Option<OccurrenceCounts> {
    let lang = Lang::from_path(file)?;
    pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(content).ok()?;
        let def_kinds: BTreeSet<&str> = lang
            .native_kinds(NormKind::Function)
            .iter()
            .chain(lang.native_kinds(NormKind::Class))
            .copied()
            .collect();

        let mut counts = OccurrenceCounts {
            definitions: 0,
            references: 0,
            in_strings: 0,
            in_comments: 0,
        };
        let mut stack = vec![parsed.root_node()];
        while let Some(node) = stack.pop() {
            if matches!(node.kind(), "identifier" | "type_identifier")
                && &content[node.byte_range()] == name
            {
                let mut in_string = false;
                let mut in_comment = false;
                let mut ancestor = node.parent();
                while let Some(a) = ancestor {
                    if is_string_kind(a.kind()) {
                        in_string = true;
                        break;
                    }
                    if is_comment_kind(a.kind()) {
                        in_comment = true;
                        break;
                    }
                    ancestor = a.parent();
                }
                if in_string {
                    counts.in_strings += 1;
                } else if in_comment {
                    counts.in_comments += 1;
                } else if node.parent().is_some_and(|p| {
                    def_kinds.contains(p.kind())
                        && p.child_by_field_name("name").is_some_and(|n| n == node)
                }) {
                    counts.definitions += 1;
                } else {
                    counts.references += 1;
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                stack.push(child);
            }
        }

        let total =
            counts.definitions + counts.references + counts.in_strings + counts.in_comments;
        (total > 0).then_some(counts)
    })
    .ok()
    .flatten()
}

fn extract_callable_name(code: &str) -> Option<String> {
    let re = regex::Regex::new(r"\b(?:def|function)\s+(\w+)\s*\(").ok()?;
    if let Some(c) = re.captures(code) {
        return Some(c[1].to_string());
    }
    let re = regex::Regex::new(r"\b(\w+)\s*\(").ok()?;
    re.captures(code).map(|c| c[1].to_string())
}

/// Layer 2: simulate the per-file line-count delta of each legacy step
/// and warn when a later step addresses lines after drift.
fn check_line_drift(steps: &[(usize, &Value)], report: &mut PlanReport) {
    let mut by_file: BTreeMap<String, Vec<(usize, &Value)>> = BTreeMap::new();
    for (i, step) in steps {
        let file = params_of(step)
            .get("file")
            .and_then(Value::as_str)
            .unwrap_or("");
        if !file.is_empty() && file != "all" {
            by_file.entry(file.to_string()).or_default().push((*i, step));
        }
    }

    for (file, steps) in by_file {
        let mut drift: i64 = 0;
        for (i, step) in steps {
            let op = op_of(step);
            let params = params_of(step);

            if matches!(op, "insert_code" | "delete_lines" | "wrap_block") && drift != 0 {
                report.warnings.push(format!(
                    "Step {i} ({op}): line numbers may be off by {drift:+} lines due to earlier edits on {file}"
                ));
            }

            let line_count = |key: &str| -> i64 {
                params
                    .get(key)
                    .and_then(Value::as_str)
                    .map(|code| {
                        code.matches('\n').count() as i64
                            + if code.ends_with('\n') { 0 } else { 1 }
                    })
                    .unwrap_or(0)
            };

            match op {
                "insert_code" => drift += line_count("code"),
                "delete_lines" => {
                    let start = params.get("start_line").and_then(Value::as_i64).unwrap_or(0);
                    let end = params.get("end_line").and_then(Value::as_i64).unwrap_or(0);
                    if end >= start {
                        drift -= end - start + 1;
                    }
                }
                "wrap_block" => {
                    drift += line_count("before_code") + line_count("after_code");
                }
                "add_method" => drift += line_count("method_code") + 1,
                "add_import" | "add_class_attribute" => drift += 1,
                "replace_code" => {
                    let old = params
                        .get("pattern")
                        .and_then(Value::as_str)
                        .map(|s| s.lines().count() as i64)
                        .unwrap_or(0);
                    let new = params
                        .get("replacement")
                        .and_then(Value::as_str)
                        .map(|s| s.lines().count() as i64)
                        .unwrap_or(0);
                    drift += new - old;
                }
                _ => {}
            }
        }
    }
}

/// Layer 6: warn when a renamed or deleted symbol is imported by files
/// outside the plan.
fn check_cross_file_impact(steps: &[Value], graph: &Graph, report: &mut PlanReport) {
    let importers = graph.symbol_importers();

    let plan_files: BTreeSet<String> = steps
        .iter()
        .flat_map(|s| step_files(s))
        .filter(|f| f != "all")
        .collect();

    let mut warn = |i: usize, op: &str, symbol: &str| {
        if let Some(files) = importers.get(symbol) {
            let affected: Vec<&String> =
                files.iter().filter(|f| !plan_files.contains(*f)).collect();
            if !affected.is_empty() {
                let mut affected: Vec<&str> = affected.iter().map(|s| s.as_str()).collect();
                affected.sort_unstable();
                report.warnings.push(format!(
                    "Step {i} ({op}): '{symbol}' is imported by files not in this plan: {affected:?}"
                ));
            }
        }
    };

    for (i, step) in steps.iter().enumerate() {
        let op = op_of(step);
        let params = params_of(step);
        match op {
            "rename_symbol" | "modify_function_signature" => {
                let key = if op == "rename_symbol" { "old_name" } else { "func_name" };
                if let Some(name) = params.get(key).and_then(Value::as_str) {
                    warn(i, op, name);
                }
            }
            "rename_identifier" => {
                if let Some(name) = step
                    .get("target")
                    .and_then(|t| t.get("name"))
                    .and_then(Value::as_str)
                {
                    warn(i, op, name);
                }
            }
            "delete_node" => {
                let name = step
                    .get("target")
                    .and_then(|t| t.get("name"))
                    .and_then(Value::as_str)
                    .or_else(|| {
                        params
                            .get("locator")
                            .and_then(|l| l.get("name"))
                            .and_then(Value::as_str)
                    });
                if let Some(name) = name {
                    warn(i, op, name);
                }
            }
            "delete_lines" => {
                let file = params.get("file").and_then(Value::as_str).unwrap_or("");
                let start = params.get("start_line").and_then(Value::as_u64).unwrap_or(0) as usize;
                let end = params.get("end_line").and_then(Value::as_u64).unwrap_or(0) as usize;
                if !file.is_empty() && start > 0 {
                    let doomed: Vec<String> = graph
                        .symbols
                        .iter()
                        .filter(|s| s.file == file && s.start_line >= start && s.end_line <= end)
                        .map(|s| s.name.clone())
                        .collect();
                    for name in doomed {
                        warn(i, op, &name);
                    }
                }
            }
            _ => {}
        }
    }
}
