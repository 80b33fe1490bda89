//! Primitive mutators: six byte-level edits plus two read-only lookup
//! operations, each following a fixed execution protocol:
//!
//! ```text
//! read bytes -> parse -> resolve locator -> PRE-check -> compose edit
//! in memory -> re-parse -> POST-check -> (fail => nothing written)
//! -> atomic write -> structured result
//! ```
//!
//! Because the edited content is verified before any byte reaches disk,
//! a failing primitive leaves the file bit-identical to its pre-call
//! state; the reported `rolled_back` flag reflects that contract.

pub mod ops;

use crate::edit::{atomic_write, EditError};
use crate::lang::Lang;
use crate::locate::{node_in_string_or_comment, resolve_nodes, Locator, NodeSpan};
use crate::parse::ParseError;
use crate::pool;
use crate::safety::{SafetyError, WorkspaceGuard};
use crate::verify::post::{run_postconditions, PostContext};
use ops::PlannedEdit;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub const MUTATING_PRIMITIVES: &[&str] = &[
    "replace_node",
    "insert_before_node",
    "insert_after_node",
    "delete_node",
    "wrap_node",
    "replace_all_matching",
];

pub const READONLY_PRIMITIVES: &[&str] = &["locate", "locate_region"];

pub fn is_primitive(name: &str) -> bool {
    MUTATING_PRIMITIVES.contains(&name) || READONLY_PRIMITIVES.contains(&name)
}

/// Result of one primitive call, serialized verbatim onto the wire.
#[derive(Debug, Clone, Serialize, Default)]
pub struct PrimOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<bool>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl PrimOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        PrimOutcome {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn rolled_back(error: impl Into<String>) -> Self {
        PrimOutcome {
            success: false,
            error: Some(error.into()),
            rolled_back: Some(true),
            ..Default::default()
        }
    }
}

/// Options threaded from the step router into a primitive run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Set by Tier-2 templates that declare an intentional kind change;
    /// waives the L1 postcondition.
    pub expect_kind_change: bool,
    pub guard: Option<&'a WorkspaceGuard>,
}

#[derive(Error, Debug)]
enum PrimError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Edit(#[from] EditError),
    #[error("{0}")]
    Safety(#[from] SafetyError),
    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),
    #[error("{0}")]
    Precondition(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

struct Resolution {
    spans: Vec<NodeSpan>,
    /// Spans surviving the `not_in_string_or_comment` filter (equal to
    /// `spans` when no filter was requested).
    filtered: Vec<NodeSpan>,
    /// Match count with the `index` disambiguator removed, used to tell
    /// "nothing matched" apart from "index out of bounds".
    unindexed_count: usize,
}

/// Execute a mutating primitive against the file named by its locator.
pub fn execute_primitive(name: &str, params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    match run_mutating(name, params, opts) {
        Ok(outcome) => outcome,
        Err(PrimError::Precondition(msg)) => PrimOutcome::failure(msg),
        Err(e) => PrimOutcome::failure(e.to_string()),
    }
}

/// Execute a read-only primitive (`locate` or `locate_region`).
pub fn execute_readonly(name: &str, params: &Value) -> Value {
    match run_readonly(name, params) {
        Ok(value) => value,
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

fn locator_from(params: &Value) -> Result<Locator, PrimError> {
    let raw = params.get("locator").cloned().unwrap_or_else(|| params.clone());
    Ok(serde_json::from_value(raw)?)
}

fn target_file(params: &Value, locator: &Locator) -> Result<String, PrimError> {
    if !locator.file.is_empty() {
        return Ok(locator.file.clone());
    }
    params
        .get("file")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| PrimError::Precondition("no file specified in locator or params".into()))
}

fn read_target(
    file: &str,
    guard: Option<&WorkspaceGuard>,
) -> Result<(PathBuf, Lang, String), PrimError> {
    let path = match guard {
        Some(g) => g.validate_path(file)?,
        None => PathBuf::from(file),
    };
    let lang = Lang::from_path(&path).ok_or_else(|| {
        PrimError::Precondition(format!("unsupported file type: {file}"))
    })?;
    let source = std::fs::read_to_string(&path).map_err(|e| PrimError::Read {
        path: file.to_string(),
        source: e,
    })?;
    Ok((path, lang, source))
}

fn resolve_target(
    lang: Lang,
    source: &str,
    locator: &Locator,
    filter: Option<&str>,
) -> Result<Resolution, PrimError> {
    pool::with_parser(lang, |p| -> Result<Resolution, PrimError> {
        let parsed = p.parse_with_source(source)?;
        let nodes = resolve_nodes(locator, &parsed)?;

        let unindexed_count = if locator.index.is_some() {
            let mut base = locator.clone();
            base.index = None;
            resolve_nodes(&base, &parsed)?.len()
        } else {
            nodes.len()
        };

        let spans: Vec<NodeSpan> = nodes.iter().map(|n| NodeSpan::of(*n)).collect();
        let filtered = if filter == Some("not_in_string_or_comment") {
            nodes
                .iter()
                .filter(|n| !node_in_string_or_comment(**n))
                .map(|n| NodeSpan::of(*n))
                .collect()
        } else {
            spans.clone()
        };

        Ok(Resolution {
            spans,
            filtered,
            unindexed_count,
        })
    })?
}

fn check_preconditions(name: &str, locator: &Locator, res: &Resolution) -> Result<(), PrimError> {
    if res.spans.is_empty() {
        if locator.index.is_some() && res.unindexed_count > 0 {
            return Err(PrimError::Precondition("locator index out of bounds".into()));
        }
        return Err(PrimError::Precondition(format!(
            "node not found for {name}: {}",
            locator.describe()
        )));
    }

    let requires_unique = matches!(name, "replace_node" | "delete_node" | "wrap_node");
    if requires_unique && res.spans.len() > 1 && locator.index.is_none() {
        return Err(PrimError::Precondition(format!(
            "ambiguous: {} matches for {name}, use 'index' to disambiguate: {}",
            res.spans.len(),
            locator.describe()
        )));
    }
    Ok(())
}

fn run_mutating(name: &str, params: &Value, opts: RunOptions<'_>) -> Result<PrimOutcome, PrimError> {
    let locator = locator_from(params)?;
    let file = target_file(params, &locator)?;
    let (path, lang, source) = read_target(&file, opts.guard)?;

    let filter = params.get("filter").and_then(Value::as_str);
    let res = resolve_target(lang, &source, &locator, filter)?;
    check_preconditions(name, &locator, &res)?;

    let str_param = |key: &str| -> Result<String, PrimError> {
        params
            .get(key)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| PrimError::Precondition(format!("missing parameter '{key}' for {name}")))
    };

    let planned: PlannedEdit = match name {
        "replace_node" => ops::replace_node(&source, &res.spans[0], &str_param("replacement")?),
        "insert_before_node" => ops::insert_before(&source, &res.spans[0], &str_param("code")?),
        "insert_after_node" => {
            let separator = params
                .get("separator")
                .and_then(Value::as_str)
                .unwrap_or("");
            ops::insert_after(&source, &res.spans[0], &str_param("code")?, separator)
        }
        "delete_node" => ops::delete_node(&source, &res.spans[0]),
        "wrap_node" => {
            let indent_body = params
                .get("indent_body")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            ops::wrap_node(
                &source,
                &res.spans[0],
                &str_param("before")?,
                &str_param("after")?,
                indent_body,
            )
        }
        "replace_all_matching" => {
            if res.filtered.is_empty() {
                return Err(PrimError::Precondition(
                    "no eligible occurrences after filtering".into(),
                ));
            }
            ops::replace_all(&source, &res.filtered, &str_param("replacement")?)
        }
        other => {
            return Err(PrimError::Precondition(format!("unknown primitive: {other}")));
        }
    };

    commit(name, &locator, &file, &path, lang, &source, planned, opts)
}

/// Shared commit path: postconditions against the in-memory result,
/// then a single atomic write. Exposed to template handlers through
/// `run_mutating`-shaped wrappers only.
#[allow(clippy::too_many_arguments)]
fn commit(
    name: &str,
    locator: &Locator,
    file: &str,
    path: &std::path::Path,
    lang: Lang,
    source: &str,
    planned: PlannedEdit,
    opts: RunOptions<'_>,
) -> Result<PrimOutcome, PrimError> {
    let ctx = PostContext {
        lang,
        op: name,
        file,
        original: source,
        edited: &planned.new_content,
        edit_start: planned.edit_start,
        old_edit_end: planned.old_edit_end,
        new_edit_end: planned.new_edit_end,
        replaced_kind: planned.replaced_kind.as_deref(),
        replacement_text: planned.replacement_text.as_deref(),
        original_span_text: planned.original_span_text.as_deref(),
        expect_kind_change: opts.expect_kind_change,
    };
    let report = run_postconditions(&ctx)?;
    if report.blocking() {
        return Ok(PrimOutcome::rolled_back(report.errors.join("; ")));
    }

    // delete_node postcondition: the locator must no longer resolve.
    if name == "delete_node" {
        let still_there = pool::with_parser(lang, |p| -> Result<usize, ParseError> {
            let parsed = p.parse_with_source(&planned.new_content)?;
            Ok(resolve_nodes(locator, &parsed)?.len())
        })??;
        if still_there > 0 {
            return Ok(PrimOutcome::rolled_back(format!(
                "delete_node postcondition: locator still matches {still_there} node(s)"
            )));
        }
    }

    atomic_write(path, planned.new_content.as_bytes())?;
    debug!(op = name, file, "primitive committed");

    Ok(PrimOutcome {
        success: true,
        warnings: report.warnings,
        result: Some(planned.result),
        ..Default::default()
    })
}

/// Commit a handler-composed edit (template or fragment mechanics that
/// splice several coordinated spans at once) through the standard
/// postcondition and atomic-write path.
pub(crate) fn commit_planned(
    op: &str,
    file: &str,
    planned: PlannedEdit,
    opts: RunOptions<'_>,
) -> PrimOutcome {
    let inner = || -> Result<PrimOutcome, PrimError> {
        let (path, lang, source) = read_target(file, opts.guard)?;
        let locator = Locator::default();
        commit(op, &locator, file, &path, lang, &source, planned, opts)
    };
    match inner() {
        Ok(outcome) => outcome,
        Err(e) => PrimOutcome::failure(e.to_string()),
    }
}

fn run_readonly(name: &str, params: &Value) -> Result<Value, PrimError> {
    let locator = locator_from(params)?;
    let file = target_file(params, &locator)?;
    let (_, lang, source) = read_target(&file, None)?;
    let res = resolve_target(lang, &source, &locator, None)?;

    match name {
        "locate" => {
            let nodes: Vec<Value> = res
                .spans
                .iter()
                .map(|s| {
                    let text = &source[s.start_byte..s.end_byte];
                    let preview = if text.len() > 100 {
                        let cut = text
                            .char_indices()
                            .take_while(|(i, _)| *i <= 100)
                            .last()
                            .map(|(i, _)| i)
                            .unwrap_or(0);
                        format!("{}...", &text[..cut])
                    } else {
                        text.to_string()
                    };
                    json!({
                        "start_line": s.start_line,
                        "end_line": s.end_line,
                        "kind": s.kind,
                        "text_preview": preview,
                    })
                })
                .collect();
            Ok(json!({
                "success": true,
                "found": !nodes.is_empty(),
                "count": nodes.len(),
                "nodes": nodes,
            }))
        }
        "locate_region" => {
            let Some(span) = res.spans.first() else {
                return Ok(json!({ "success": false, "error": "no nodes matched" }));
            };
            Ok(json!({
                "success": true,
                "start_byte": span.start_byte,
                "end_byte": span.end_byte,
                "start_line": span.start_line,
                "end_line": span.end_line,
                "text": &source[span.start_byte..span.end_byte],
            }))
        }
        other => Err(PrimError::Precondition(format!(
            "unknown read-only primitive: {other}"
        ))),
    }
}
