//! Typed AST fragments (Tier 3).
//!
//! Instead of writing code as a string, the caller describes an AST
//! subtree as JSON: a `kind`, kind-specific properties (expressions as
//! strings), and `children`. The engine validates the shape and
//! serializes it to source text with correct indentation, then applies
//! it through a byte-level primitive.

use crate::lang::Lang;
use crate::locate::Locator;
use crate::prim::ops::leading_indent;
use crate::prim::{self, PrimOutcome, RunOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A structured description of code to generate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub kind: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Fragment>,
}

/// Kinds that carry no children.
const LEAF_KINDS: &[&str] = &[
    "return_statement",
    "raise_statement",
    "assignment",
    "expression_statement",
];

const SUPPORTED_KINDS: &[&str] = &[
    "function_definition",
    "class_definition",
    "if_statement",
    "elif_clause",
    "else_clause",
    "for_statement",
    "while_statement",
    "with_statement",
    "try_statement",
    "except_clause",
    "finally_clause",
    "return_statement",
    "raise_statement",
    "assignment",
    "expression_statement",
];

fn required_properties(kind: &str) -> &'static [&'static str] {
    match kind {
        "if_statement" | "elif_clause" | "while_statement" => &["condition"],
        "for_statement" => &["target", "iterable"],
        "with_statement" => &["context_expr"],
        "function_definition" => &["name", "parameters"],
        "class_definition" => &["name"],
        "return_statement" | "raise_statement" => &["value"],
        "assignment" => &["target", "value"],
        "expression_statement" => &["expression"],
        _ => &[],
    }
}

impl Fragment {
    fn prop_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn prop_list(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => {
                s.split(',').map(|p| p.trim().to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Validate a fragment tree: supported kind, required properties present
/// and non-empty, leaves childless, children recursively valid.
pub fn validate_fragment(frag: &Fragment) -> Vec<String> {
    let mut errors = Vec::new();
    validate_into(frag, &mut errors, "fragment");
    errors
}

fn validate_into(frag: &Fragment, errors: &mut Vec<String>, path: &str) {
    if frag.kind.is_empty() {
        errors.push(format!("{path}: fragment kind must be non-empty"));
        return;
    }
    if !SUPPORTED_KINDS.contains(&frag.kind.as_str()) {
        errors.push(format!("{path}: unsupported fragment kind '{}'", frag.kind));
        return;
    }

    for prop in required_properties(&frag.kind) {
        let present = match frag.properties.get(*prop) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if !present {
            errors.push(format!("{path}: '{}' requires property '{prop}'", frag.kind));
        }
    }

    if LEAF_KINDS.contains(&frag.kind.as_str()) && !frag.children.is_empty() {
        errors.push(format!(
            "{path}: '{}' is a leaf kind and cannot contain children",
            frag.kind
        ));
    }

    for (i, child) in frag.children.iter().enumerate() {
        validate_into(child, errors, &format!("{path}.children[{i}]"));
    }
}

/// Serialize a fragment to source text at the given indentation level
/// (four columns per level). Child statements go one level deeper;
/// `elif`/`else`/`except`/`finally` clauses are emitted as siblings of
/// their parent construct.
pub fn serialize_fragment(frag: &Fragment, indent: usize) -> String {
    let pad = "    ".repeat(indent);
    let inner = "    ".repeat(indent + 1);

    let body = |children: &[Fragment]| -> String {
        if children.is_empty() {
            return format!("{inner}pass");
        }
        children
            .iter()
            .map(|c| serialize_fragment(c, indent + 1))
            .collect::<Vec<_>>()
            .join("\n")
    };

    match frag.kind.as_str() {
        "function_definition" => {
            let params = frag.prop_list("parameters").join(", ");
            let name = frag.prop_str("name").unwrap_or_default();
            let mut lines = Vec::new();
            if let Some(dec) = frag.prop_str("decorator") {
                lines.push(format!("{pad}@{dec}"));
            }
            let mut sig = format!("{pad}def {name}({params})");
            if let Some(ret) = frag.prop_str("return_type") {
                sig.push_str(&format!(" -> {ret}"));
            }
            sig.push(':');
            lines.push(sig);
            lines.push(body(&frag.children));
            lines.join("\n")
        }

        "class_definition" => {
            let name = frag.prop_str("name").unwrap_or_default();
            let bases = frag.prop_list("bases");
            let header = if bases.is_empty() {
                format!("{pad}class {name}:")
            } else {
                format!("{pad}class {name}({}):", bases.join(", "))
            };
            format!("{header}\n{}", body(&frag.children))
        }

        "if_statement" => {
            let (clauses, plain): (Vec<&Fragment>, Vec<&Fragment>) = frag
                .children
                .iter()
                .partition(|c| matches!(c.kind.as_str(), "elif_clause" | "else_clause"));
            let plain: Vec<Fragment> = plain.into_iter().cloned().collect();
            let mut out = format!(
                "{pad}if {}:\n{}",
                frag.prop_str("condition").unwrap_or_default(),
                body(&plain)
            );
            for clause in clauses {
                out.push('\n');
                out.push_str(&serialize_fragment(clause, indent));
            }
            out
        }

        "elif_clause" => format!(
            "{pad}elif {}:\n{}",
            frag.prop_str("condition").unwrap_or_default(),
            body(&frag.children)
        ),

        "else_clause" => format!("{pad}else:\n{}", body(&frag.children)),

        "for_statement" => format!(
            "{pad}for {} in {}:\n{}",
            frag.prop_str("target").unwrap_or_default(),
            frag.prop_str("iterable").unwrap_or_default(),
            body(&frag.children)
        ),

        "while_statement" => format!(
            "{pad}while {}:\n{}",
            frag.prop_str("condition").unwrap_or_default(),
            body(&frag.children)
        ),

        "with_statement" => {
            let ctx = frag.prop_str("context_expr").unwrap_or_default();
            let header = match frag.prop_str("as_var") {
                Some(var) => format!("{pad}with {ctx} as {var}:"),
                None => format!("{pad}with {ctx}:"),
            };
            format!("{header}\n{}", body(&frag.children))
        }

        "try_statement" => {
            let is_clause = |c: &Fragment| {
                matches!(
                    c.kind.as_str(),
                    "except_clause" | "else_clause" | "finally_clause"
                )
            };
            let body_children: Vec<Fragment> = frag
                .children
                .iter()
                .filter(|c| !is_clause(c))
                .cloned()
                .collect();
            let mut out = format!("{pad}try:\n{}", body(&body_children));
            for clause in frag.children.iter().filter(|c| is_clause(c)) {
                out.push('\n');
                out.push_str(&serialize_fragment(clause, indent));
            }
            out
        }

        "except_clause" => {
            let mut header = format!("{pad}except");
            if let Some(exc) = frag.prop_str("exception_type") {
                header.push_str(&format!(" {exc}"));
                if let Some(var) = frag.prop_str("exception_var") {
                    header.push_str(&format!(" as {var}"));
                }
            }
            header.push(':');
            format!("{header}\n{}", body(&frag.children))
        }

        "finally_clause" => format!("{pad}finally:\n{}", body(&frag.children)),

        "return_statement" => {
            let val = frag.prop_str("value").unwrap_or_default();
            format!("{pad}return {val}").trim_end().to_string()
        }

        "raise_statement" => {
            let val = frag.prop_str("value").unwrap_or_default();
            format!("{pad}raise {val}").trim_end().to_string()
        }

        "assignment" => {
            let target = frag.prop_str("target").unwrap_or_else(|| "_".into());
            let val = frag.prop_str("value").unwrap_or_else(|| "None".into());
            match frag.prop_str("type_annotation") {
                Some(ann) => format!("{pad}{target}: {ann} = {val}"),
                None => format!("{pad}{target} = {val}"),
            }
        }

        "expression_statement" => {
            format!("{pad}{}", frag.prop_str("expression").unwrap_or_default())
        }

        _ => format!("{pad}pass"),
    }
}

/// One Tier-3 step: a fragment, a target locator, and an action.
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentStep {
    pub fragment: Fragment,
    pub target: Locator,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "replace".to_string()
}

/// Validate, size the indentation from the live target, serialize, and
/// apply through the primitive matching the requested action.
pub fn execute_fragment(step: &FragmentStep, opts: RunOptions<'_>) -> PrimOutcome {
    let errors = validate_fragment(&step.fragment);
    if !errors.is_empty() {
        return PrimOutcome::failure(format!("invalid fragment: {}", errors.join("; ")));
    }

    let file = &step.target.file;
    if file.is_empty() {
        return PrimOutcome::failure("fragment target locator must name a file");
    }
    let Some(lang) = Lang::from_path(file) else {
        return PrimOutcome::failure(format!("unsupported file type: {file}"));
    };
    if !lang.uses_indentation() {
        return PrimOutcome::failure(format!(
            "fragments serialize indentation-syntax code; {} targets are not supported",
            lang.name()
        ));
    }

    match step.action.as_str() {
        "replace" => {
            // Serialize at the target's indentation level; the first
            // line's indent is stripped because the splice point is
            // already at that column.
            let source = match std::fs::read_to_string(file) {
                Ok(s) => s,
                Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
            };
            let span = match first_span(lang, &source, &step.target) {
                Ok(Some(span)) => span,
                Ok(None) => {
                    return PrimOutcome::failure(format!(
                        "node not found for fragment target: {}",
                        step.target.describe()
                    ))
                }
                Err(e) => return PrimOutcome::failure(e.to_string()),
            };
            let indent = leading_indent(&source, span.start_byte).to_string();
            let level = indent.matches(' ').count() / 4;
            let text = serialize_fragment(&step.fragment, level);
            let replacement = text.strip_prefix(indent.as_str()).unwrap_or(&text);

            let params = json!({
                "locator": &step.target,
                "replacement": replacement,
            });
            let run = RunOptions {
                expect_kind_change: true,
                ..opts
            };
            prim::execute_primitive("replace_node", &params, run)
        }
        "insert_before" | "insert_after" => {
            let code = serialize_fragment(&step.fragment, 0);
            let op = if step.action == "insert_before" {
                "insert_before_node"
            } else {
                "insert_after_node"
            };
            let params = json!({
                "locator": &step.target,
                "code": code,
            });
            prim::execute_primitive(op, &params, opts)
        }
        other => PrimOutcome::failure(format!(
            "unknown fragment action '{other}' (expected replace|insert_before|insert_after)"
        )),
    }
}

fn first_span(
    lang: Lang,
    source: &str,
    locator: &Locator,
) -> Result<Option<crate::locate::NodeSpan>, crate::parse::ParseError> {
    crate::pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(source)?;
        Ok(crate::locate::resolve(locator, &parsed)?.into_iter().next())
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool;

    fn frag(value: Value) -> Fragment {
        serde_json::from_value(value).unwrap()
    }

    fn assert_serializes_and_parses(f: &Fragment) {
        let text = serialize_fragment(f, 0);
        let ok = pool::with_parser(Lang::Python, |p| {
            p.parse_with_source(&text).map(|t| t.parses_ok())
        })
        .unwrap()
        .unwrap();
        assert!(ok, "serialized fragment does not parse:\n{text}");
    }

    #[test]
    fn validate_requires_condition() {
        let f = frag(json!({"kind": "if_statement"}));
        let errors = validate_fragment(&f);
        assert!(errors.iter().any(|e| e.contains("condition")));
    }

    #[test]
    fn validate_rejects_children_on_leaf() {
        let f = frag(json!({
            "kind": "return_statement",
            "value": "42",
            "children": [{"kind": "expression_statement", "expression": "x"}],
        }));
        let errors = validate_fragment(&f);
        assert!(errors.iter().any(|e| e.contains("leaf")));
    }

    #[test]
    fn validate_rejects_unknown_kind() {
        let f = frag(json!({"kind": "lambda_magic"}));
        assert!(!validate_fragment(&f).is_empty());
    }

    #[test]
    fn serialize_if_raise() {
        let f = frag(json!({
            "kind": "if_statement",
            "condition": "not ok",
            "children": [{"kind": "raise_statement", "value": "ValueError('x')"}],
        }));
        assert!(validate_fragment(&f).is_empty());
        assert_eq!(
            serialize_fragment(&f, 0),
            "if not ok:\n    raise ValueError('x')"
        );
        assert_serializes_and_parses(&f);
    }

    #[test]
    fn serialize_function_with_nested_loop() {
        let f = frag(json!({
            "kind": "function_definition",
            "name": "validate_input",
            "parameters": ["self", "data"],
            "children": [
                {
                    "kind": "for_statement",
                    "target": "key",
                    "iterable": "data",
                    "children": [
                        {"kind": "expression_statement", "expression": "self.check(key)"},
                    ],
                },
                {"kind": "return_statement", "value": "data"},
            ],
        }));
        assert!(validate_fragment(&f).is_empty());
        let text = serialize_fragment(&f, 1);
        assert!(text.starts_with("    def validate_input(self, data):"));
        assert!(text.contains("        for key in data:"));
        assert!(text.contains("            self.check(key)"));
    }

    #[test]
    fn serialize_try_with_clauses_as_siblings() {
        let f = frag(json!({
            "kind": "try_statement",
            "children": [
                {"kind": "expression_statement", "expression": "result = parse(raw)"},
                {
                    "kind": "except_clause",
                    "exception_type": "ValueError",
                    "exception_var": "e",
                    "children": [
                        {"kind": "assignment", "target": "result", "value": "None"},
                    ],
                },
                {"kind": "finally_clause", "children": [
                    {"kind": "expression_statement", "expression": "cleanup()"},
                ]},
            ],
        }));
        assert!(validate_fragment(&f).is_empty());
        let text = serialize_fragment(&f, 0);
        assert_eq!(
            text,
            "try:\n    result = parse(raw)\nexcept ValueError as e:\n    result = None\nfinally:\n    cleanup()"
        );
        assert_serializes_and_parses(&f);
    }

    #[test]
    fn roundtrip_every_supported_kind() {
        let stmt = json!({"kind": "expression_statement", "expression": "work()"});
        let samples = vec![
            json!({"kind": "function_definition", "name": "f", "parameters": ["x"], "children": [stmt]}),
            json!({"kind": "class_definition", "name": "C", "children": [
                {"kind": "function_definition", "name": "m", "parameters": ["self"], "children": [stmt]},
            ]}),
            json!({"kind": "if_statement", "condition": "x", "children": [stmt,
                {"kind": "elif_clause", "condition": "y", "children": [stmt]},
                {"kind": "else_clause", "children": [stmt]},
            ]}),
            json!({"kind": "for_statement", "target": "i", "iterable": "range(3)", "children": [stmt]}),
            json!({"kind": "while_statement", "condition": "x < 3", "children": [stmt]}),
            json!({"kind": "with_statement", "context_expr": "open(p)", "as_var": "f", "children": [stmt]}),
            json!({"kind": "try_statement", "children": [stmt,
                {"kind": "except_clause", "children": [stmt]},
            ]}),
            json!({"kind": "return_statement", "value": "x"}),
            json!({"kind": "raise_statement", "value": "ValueError()"}),
            json!({"kind": "assignment", "target": "x", "value": "1"}),
            stmt.clone(),
        ];
        for sample in samples {
            let f = frag(sample);
            assert!(validate_fragment(&f).is_empty(), "kind {}", f.kind);
            assert_serializes_and_parses(&f);
        }
    }

    #[test]
    fn execute_fragment_insert_before() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "def f(x):\n    return x\n").unwrap();

        let step: FragmentStep = serde_json::from_value(json!({
            "fragment": {
                "kind": "if_statement",
                "condition": "x is None",
                "children": [{"kind": "return_statement", "value": "None"}],
            },
            "target": {
                "kind": "function", "name": "f",
                "file": path.to_string_lossy(),
                "field": "body", "nth_child": 0,
            },
            "action": "insert_before",
        }))
        .unwrap();

        let outcome = execute_fragment(&step, RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def f(x):\n    if x is None:\n        return None\n    return x\n"
        );
    }

    #[test]
    fn execute_fragment_rejects_invalid() {
        let step: FragmentStep = serde_json::from_value(json!({
            "fragment": {"kind": "if_statement"},
            "target": {"kind": "function", "name": "f", "file": "m.py"},
            "action": "replace",
        }))
        .unwrap();
        let outcome = execute_fragment(&step, RunOptions::default());
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("condition"));
    }
}
