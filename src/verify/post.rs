//! Post-edit verification levels.
//!
//! Run in order after a primitive has composed its edited content and
//! before anything is written:
//!
//! - L0 parses-ok (blocking)
//! - L1 kind preservation (blocking, `replace_node` only)
//! - L2 structural containment (blocking)
//! - L3 referential integrity (warning)
//! - L4 import closure (warning)
//! - L6 non-triviality (warning)
//!
//! L5 (arity preservation) is reserved but not implemented. L3/L4 are
//! heuristic by nature — framework-heavy code produces spurious
//! unknowns — which is exactly why they can never block.

use crate::graph::builder::build_file;
use crate::graph::Graph;
use crate::lang::{is_string_or_comment_kind, Lang, NormKind};
use crate::parse::{ParseError, ParsedSource};
use crate::pool;
use std::collections::BTreeSet;
use tree_sitter::Node;
use xxhash_rust::xxh3::xxh3_64;

/// Everything the post-edit checks need to know about one edit.
pub struct PostContext<'a> {
    pub lang: Lang,
    pub op: &'a str,
    pub file: &'a str,
    pub original: &'a str,
    pub edited: &'a str,
    /// Byte offset where the edit begins (same in both versions).
    pub edit_start: usize,
    /// End of the edited region in the original content.
    pub old_edit_end: usize,
    /// End of the edited region in the new content.
    pub new_edit_end: usize,
    /// Native kind of the replaced node (L1, `replace_node` only).
    pub replaced_kind: Option<&'a str>,
    /// Text inserted or substituted by the edit (L3/L4/L6).
    pub replacement_text: Option<&'a str>,
    /// Original text of the replaced span (L6 exact-copy check).
    pub original_span_text: Option<&'a str>,
    /// Set by templates that declare an intentional kind change.
    pub expect_kind_change: bool,
}

#[derive(Debug, Default)]
pub struct PostReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl PostReport {
    pub fn blocking(&self) -> bool {
        !self.errors.is_empty()
    }
}

const TRIVIAL_BODIES: &[&str] = &["pass", "return None", "return", "...", "raise NotImplementedError"];

/// Identifier sets collected from the edited tree for the advisory
/// levels, extracted so no parser borrow is held while imports are
/// gathered.
struct AdvisoryData {
    used: BTreeSet<String>,
    local: BTreeSet<String>,
    scope: BTreeSet<String>,
}

/// Run all applicable levels for one edit. Blocking failures populate
/// `errors`; the caller rolls back and must not write.
pub fn run_postconditions(ctx: &PostContext<'_>) -> Result<PostReport, ParseError> {
    let mut report = PostReport::default();

    // L0: the edited content must parse cleanly.
    let l0_detail = pool::with_parser(ctx.lang, |p| -> Result<Option<String>, ParseError> {
        let parsed = p.parse_with_source(ctx.edited)?;
        if parsed.parses_ok() {
            Ok(None)
        } else {
            let detail = parsed
                .error_nodes()
                .into_iter()
                .next()
                .map(|e| format!(" near line {}: {}", e.line, e.context))
                .unwrap_or_default();
            Ok(Some(detail))
        }
    })??;
    if let Some(detail) = l0_detail {
        report
            .errors
            .push(format!("L0 parse check failed after {}{}", ctx.op, detail));
        return Ok(report);
    }

    // Structural levels need both trees; collect plain data and drop the
    // parser borrow before anything else re-enters the pool.
    let advisory = pool::with_parser(ctx.lang, |p| -> Result<Option<AdvisoryData>, ParseError> {
        let old_parsed = p.parse_with_source(ctx.original)?;
        let old_siblings = siblings_outside(&old_parsed, ctx.edit_start, ctx.old_edit_end);

        let new_parsed = p.parse_with_source(ctx.edited)?;

        // L1: kind preservation for replace_node.
        if ctx.op == "replace_node" && !ctx.expect_kind_change {
            if let (Some(expected), Some(replacement)) = (ctx.replaced_kind, ctx.replacement_text) {
                let actual = replacement_root_kind(
                    &new_parsed,
                    ctx.edit_start,
                    ctx.edit_start + replacement.len(),
                );
                if let Some(actual) = actual {
                    if actual != expected {
                        report.errors.push(format!(
                            "L1 kind check failed: replacement is '{actual}', expected '{expected}'"
                        ));
                    }
                }
            }
        }

        // L2: top-level siblings outside the edit range are untouched.
        let new_siblings = siblings_outside(&new_parsed, ctx.edit_start, ctx.new_edit_end);
        if old_siblings != new_siblings {
            report
                .errors
                .push("L2 containment check failed: nodes outside the edit region changed".into());
        }

        if report.blocking() || ctx.replacement_text.is_none() {
            return Ok(None);
        }

        let span = ctx.edit_start..ctx.new_edit_end;
        Ok(Some(AdvisoryData {
            used: identifiers_used(&new_parsed, span.clone()),
            local: names_defined_in(&new_parsed, span),
            scope: bindings_in_scope(&new_parsed, ctx.edit_start),
        }))
    })??;

    let Some(AdvisoryData { used, local, scope }) = advisory else {
        return Ok(report);
    };
    let replacement = ctx.replacement_text.unwrap_or_default();
    let builtins: BTreeSet<&str> = ctx.lang.builtins().iter().copied().collect();

    let mut imports = Graph::default();
    let _ = build_file(&mut imports, ctx.lang, ctx.file, ctx.edited);
    let has_star_import = imports
        .imports
        .iter()
        .any(|i| i.symbol.as_deref() == Some("*"));
    let imported: BTreeSet<String> = imports
        .imports
        .iter()
        .flat_map(|i| {
            let mut names: Vec<String> = Vec::new();
            if let Some(sym) = &i.symbol {
                for part in sym.split(',') {
                    names.push(part.trim().trim_matches(|c| c == '{' || c == '}').to_string());
                }
            }
            let tail = i.module.rsplit(['.', ':', '/', '\\']).next().unwrap_or("");
            if !tail.is_empty() {
                names.push(tail.to_string());
            }
            names
        })
        .collect();

    // L3: every identifier read in the replacement must resolve.
    let mut unresolved = BTreeSet::new();
    for name in &used {
        if local.contains(name)
            || scope.contains(name)
            || builtins.contains(name.as_str())
            || imported.contains(name)
        {
            continue;
        }
        unresolved.insert(name.clone());
        report.warnings.push(format!(
            "L3 referential check: identifier '{name}' may not be in scope at the edit site"
        ));
    }

    // L4: non-local, non-builtin symbols must be importable. Names
    // already flagged by L3 are skipped, and a star import satisfies
    // everything.
    if !has_star_import {
        for name in &used {
            if local.contains(name)
                || scope.contains(name)
                || builtins.contains(name.as_str())
                || unresolved.contains(name)
            {
                continue;
            }
            if !imported.contains(name) {
                report.warnings.push(format!(
                    "L4 import check: '{name}' is used but not imported in {}",
                    ctx.file
                ));
            }
        }
    }

    // L6: the new text is not degenerate.
    let stripped = replacement.trim();
    if stripped.is_empty() || TRIVIAL_BODIES.contains(&stripped) {
        report.warnings.push(format!(
            "L6 triviality check: replacement is degenerate: '{stripped}'"
        ));
    } else if let Some(before) = ctx.original_span_text {
        if before.trim() == stripped {
            report
                .warnings
                .push("L6 triviality check: replacement is identical to the original".into());
        }
    }

    Ok(report)
}

/// (kind, content-hash) of each root-level child lying entirely outside
/// the edit region, in order.
fn siblings_outside(parsed: &ParsedSource<'_>, start: usize, end: usize) -> Vec<(String, u64)> {
    let root = parsed.root_node();
    let mut out = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.end_byte() <= start || child.start_byte() >= end {
            out.push((
                child.kind().to_string(),
                xxh3_64(parsed.node_text(child).as_bytes()),
            ));
        }
    }
    out
}

/// Smallest named node spanning the whole replacement, ascended to the
/// outermost node with that exact byte range.
fn replacement_root_kind(parsed: &ParsedSource<'_>, start: usize, end: usize) -> Option<String> {
    let mut node = parsed.root_node().named_descendant_for_byte_range(start, end)?;
    while let Some(parent) = node.parent() {
        if parent.start_byte() == node.start_byte()
            && parent.end_byte() == node.end_byte()
            && parent.kind() != "module"
            && parent.kind() != "source_file"
        {
            node = parent;
        } else {
            break;
        }
    }
    Some(node.kind().to_string())
}

fn is_identifier_kind(kind: &str) -> bool {
    matches!(kind, "identifier" | "type_identifier" | "constant" | "name")
}

/// Identifier reads inside a byte range. Skips member-access attribute
/// names and anything inside strings or comments.
fn identifiers_used(parsed: &ParsedSource<'_>, range: std::ops::Range<usize>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_identifiers(parsed.root_node(), parsed.source, &range, &mut out);
    out
}

fn collect_identifiers(
    node: Node<'_>,
    source: &str,
    range: &std::ops::Range<usize>,
    out: &mut BTreeSet<String>,
) {
    if node.end_byte() <= range.start || node.start_byte() >= range.end {
        return;
    }
    if is_string_or_comment_kind(node.kind()) {
        return;
    }
    if is_identifier_kind(node.kind())
        && node.start_byte() >= range.start
        && node.end_byte() <= range.end
    {
        let is_attribute_name = node.parent().is_some_and(|p| {
            matches!(
                p.kind(),
                "attribute" | "member_expression" | "field_expression" | "scoped_identifier"
            ) && p
                .child_by_field_name("attribute")
                .or_else(|| p.child_by_field_name("property"))
                .or_else(|| p.child_by_field_name("field"))
                .is_some_and(|n| n == node)
        });
        if !is_attribute_name {
            out.insert(source[node.byte_range()].to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifiers(child, source, range, out);
    }
}

/// Names bound inside a byte range: assignment targets, definition
/// names, parameters, loop targets, `as` bindings.
fn names_defined_in(parsed: &ParsedSource<'_>, range: std::ops::Range<usize>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_definitions(parsed.root_node(), parsed.source, parsed.lang, &range, &mut out);
    out
}

fn collect_definitions(
    node: Node<'_>,
    source: &str,
    lang: Lang,
    range: &std::ops::Range<usize>,
    out: &mut BTreeSet<String>,
) {
    if node.end_byte() <= range.start || node.start_byte() >= range.end {
        return;
    }
    binding_names(node, source, lang, out);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_definitions(child, source, lang, range, out);
    }
}

/// Names a single node binds, if any.
fn binding_names(node: Node<'_>, source: &str, lang: Lang, out: &mut BTreeSet<String>) {
    let kind = node.kind();

    let is_def = lang.native_kinds(NormKind::Function).contains(&kind)
        || lang.native_kinds(NormKind::Class).contains(&kind);
    if is_def {
        if let Some(name) = crate::locate::node_name(node, source) {
            out.insert(name);
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            collect_identifier_leaves(params, source, out);
        }
        return;
    }

    if matches!(
        kind,
        "assignment"
            | "augmented_assignment"
            | "let_declaration"
            | "variable_declarator"
            | "short_var_declaration"
    ) {
        for field in ["left", "target", "name", "pattern"] {
            if let Some(target) = node.child_by_field_name(field) {
                collect_identifier_leaves(target, source, out);
                break;
            }
        }
    } else if matches!(kind, "for_statement" | "for_in_statement" | "for_expression") {
        for field in ["left", "target", "pattern"] {
            if let Some(target) = node.child_by_field_name(field) {
                collect_identifier_leaves(target, source, out);
                break;
            }
        }
    } else if kind == "as_pattern_target" || kind == "except_clause" || kind == "with_item" {
        if let Some(alias) = node.child_by_field_name("alias") {
            collect_identifier_leaves(alias, source, out);
        }
    }
}

fn collect_identifier_leaves(node: Node<'_>, source: &str, out: &mut BTreeSet<String>) {
    if is_identifier_kind(node.kind()) {
        out.insert(source[node.byte_range()].to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_identifier_leaves(child, source, out);
    }
}

/// Bindings visible at a byte position: module-level names plus the
/// parameters and locals of every enclosing definition.
fn bindings_in_scope(parsed: &ParsedSource<'_>, at: usize) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let lang = parsed.lang;
    let root = parsed.root_node();

    // Module level
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        binding_names(child, parsed.source, lang, &mut out);
        // Top-level simple statements wrap the actual assignment.
        if child.kind() == "expression_statement" {
            let mut inner = child.walk();
            for grand in child.children(&mut inner) {
                binding_names(grand, parsed.source, lang, &mut out);
            }
        }
    }

    // Enclosing definitions
    let Some(mut node) = root.descendant_for_byte_range(at, at) else {
        return out;
    };
    loop {
        let kind = node.kind();
        if lang.native_kinds(NormKind::Function).contains(&kind) {
            binding_names(node, parsed.source, lang, &mut out);
            let range = node.start_byte()..node.end_byte();
            collect_definitions(node, parsed.source, lang, &range, &mut out);
        } else if lang.native_kinds(NormKind::Class).contains(&kind) {
            if let Some(name) = crate::locate::node_name(node, parsed.source) {
                out.insert(name);
            }
        }
        match node.parent() {
            Some(parent) => node = parent,
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        op: &'a str,
        original: &'a str,
        edited: &'a str,
        edit_start: usize,
        old_edit_end: usize,
        new_edit_end: usize,
    ) -> PostContext<'a> {
        PostContext {
            lang: Lang::Python,
            op,
            file: "m.py",
            original,
            edited,
            edit_start,
            old_edit_end,
            new_edit_end,
            replaced_kind: None,
            replacement_text: None,
            original_span_text: None,
            expect_kind_change: false,
        }
    }

    #[test]
    fn l0_blocks_parse_errors() {
        let original = "def f(x):\n    return x\n";
        let edited = "def f(x:\n    return x\n";
        let report = run_postconditions(&ctx("replace_node", original, edited, 0, 8, 8)).unwrap();
        assert!(report.blocking());
        assert!(report.errors[0].contains("L0"));
    }

    #[test]
    fn l1_blocks_kind_change() {
        let original = "def g():\n    return 1\n";
        let edited = "g = 1\n";
        let mut c = ctx("replace_node", original, edited, 0, original.len() - 1, 5);
        c.replaced_kind = Some("function_definition");
        c.replacement_text = Some("g = 1");
        let report = run_postconditions(&c).unwrap();
        assert!(report.blocking());
        assert!(report.errors.iter().any(|e| e.contains("L1")));
    }

    #[test]
    fn l1_waived_for_declared_kind_change() {
        let original = "def g():\n    return 1\n";
        let edited = "g = 1\n";
        let mut c = ctx("replace_node", original, edited, 0, original.len() - 1, 5);
        c.replaced_kind = Some("function_definition");
        c.replacement_text = Some("g = 1");
        c.expect_kind_change = true;
        let report = run_postconditions(&c).unwrap();
        assert!(!report.errors.iter().any(|e| e.contains("L1")));
    }

    #[test]
    fn l3_l4_warn_but_never_block() {
        let original = "def f(x):\n    return x\n";
        // Replacement references an unknown name.
        let edited = "def f(x):\n    return mystery_helper(x)\n";
        let mut c = ctx(
            "replace_node",
            original,
            edited,
            14,
            original.len() - 1,
            edited.len() - 1,
        );
        c.replacement_text = Some("return mystery_helper(x)");
        let report = run_postconditions(&c).unwrap();
        assert!(!report.blocking());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("mystery_helper")));
    }

    #[test]
    fn l3_accepts_params_and_imports() {
        let original = "from os.path import join\n\ndef f(x):\n    return x\n";
        let edited = "from os.path import join\n\ndef f(x):\n    return join(x, x)\n";
        let start = original.find("return x").unwrap();
        let mut c = ctx(
            "replace_node",
            original,
            edited,
            start,
            start + "return x".len(),
            start + "return join(x, x)".len(),
        );
        c.replacement_text = Some("return join(x, x)");
        let report = run_postconditions(&c).unwrap();
        assert!(
            report.warnings.iter().all(|w| !w.contains("'join'") && !w.contains("'x'")),
            "unexpected warnings: {:?}",
            report.warnings
        );
    }

    #[test]
    fn l6_flags_trivial_replacement() {
        let original = "def f(x):\n    return x + 1\n";
        let edited = "def f(x):\n    pass\n";
        let start = original.find("return").unwrap();
        let mut c = ctx(
            "replace_node",
            original,
            edited,
            start,
            start + "return x + 1".len(),
            start + "pass".len(),
        );
        c.replacement_text = Some("pass");
        c.original_span_text = Some("return x + 1");
        let report = run_postconditions(&c).unwrap();
        assert!(!report.blocking());
        assert!(report.warnings.iter().any(|w| w.contains("L6")));
    }

    #[test]
    fn l2_passes_for_contained_edit() {
        let original = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        let edited = "def a():\n    return 10\n\ndef b():\n    return 2\n";
        let start = original.find("return 1").unwrap();
        let c = ctx(
            "replace_node",
            original,
            edited,
            start,
            start + "return 1".len(),
            start + "return 10".len(),
        );
        let report = run_postconditions(&c).unwrap();
        assert!(!report.blocking(), "{:?}", report.errors);
    }
}
