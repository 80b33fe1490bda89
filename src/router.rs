//! Step router: detects a step's tier from its shape and dispatches to
//! the matching execution path.
//!
//! Dispatch order for a step: formal tier 1/2/3 first, then primitives,
//! then composed operators (built-in or plan-defined), then legacy
//! operators. All paths produce the same structured outcome shape.

use crate::dsl::{self, CustomOp};
use crate::fragment::{self, FragmentStep};
use crate::legacy;
use crate::plan::{detect_tier, Tier};
use crate::prim::{self, PrimOutcome, RunOptions};
use crate::surgery;
use crate::template;
use serde_json::{json, Value};
use tracing::debug;

/// Execute one plan step. Returns the full result payload: step results
/// carry `{success, error?, warnings}`, read-only lookups carry their
/// own shapes (`{found, count, nodes}` / byte regions).
pub fn execute_step(step: &Value, custom_ops: &[CustomOp], opts: RunOptions<'_>) -> Value {
    let tier = detect_tier(step);
    debug!(?tier, "step dispatch");

    match tier {
        Tier::Surgery => outcome_value(surgery::execute_surgery(step, opts)),
        Tier::Template => {
            let Some(name) = step.get("template").and_then(Value::as_str) else {
                return error_value("step 'template' must be a string");
            };
            let params = step.get("params").cloned().unwrap_or_else(|| json!({}));
            outcome_value(template::execute_template(name, &params, opts))
        }
        Tier::Fragment => match serde_json::from_value::<FragmentStep>(step.clone()) {
            Ok(frag_step) => outcome_value(fragment::execute_fragment(&frag_step, opts)),
            Err(e) => error_value(format!("invalid fragment step: {e}")),
        },
        Tier::Other => {
            let Some(op) = step.get("op").and_then(Value::as_str) else {
                return error_value("step must have one of 'op', 'template', or 'fragment'");
            };
            let params = step.get("params").cloned().unwrap_or_else(|| json!({}));

            if prim::READONLY_PRIMITIVES.contains(&op) {
                return prim::execute_readonly(op, &params);
            }
            if prim::MUTATING_PRIMITIVES.contains(&op) {
                return outcome_value(prim::execute_primitive(op, &params, opts));
            }
            if dsl::is_builtin_composed(op) || custom_ops.iter().any(|c| c.define == op) {
                return outcome_value(dsl::execute_composed_op(op, &params, custom_ops, opts));
            }
            if legacy::is_legacy(op) {
                return outcome_value(legacy::execute_legacy(op, &params, opts));
            }
            error_value(format!("unknown operator: {op}"))
        }
    }
}

fn outcome_value(outcome: PrimOutcome) -> Value {
    serde_json::to_value(&outcome).unwrap_or_else(|_| json!({ "success": false }))
}

fn error_value(message: impl Into<String>) -> Value {
    json!({ "success": false, "error": message.into(), "warnings": [] })
}

/// The structured error shape of the external interface, used when a
/// step fails parameter validation before execution.
pub fn structured_error(level: &str, step_index: usize, message: &str) -> Value {
    json!({
        "success": false,
        "errors": [{
            "level": level,
            "step_index": step_index,
            "message": message,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn routes_surgery_step() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def old():\n    pass\n\ndef keep():\n    pass\n");
        let step = json!({
            "op": "delete_node",
            "target": {"kind": "function", "name": "old", "file": file},
        });
        let result = execute_step(&step, &[], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
        assert!(!fs::read_to_string(dir.path().join("m.py")).unwrap().contains("old"));
    }

    #[test]
    fn routes_template_step() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def f(x):\n    return x\n");
        let step = json!({
            "template": "guard_clause",
            "params": {
                "target": {"kind": "function", "name": "f", "file": file, "field": "body"},
                "condition": "x is None",
                "guard_body": "return None",
            },
        });
        let result = execute_step(&step, &[], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
    }

    #[test]
    fn routes_fragment_step() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def f():\n    return 1\n");
        let step = json!({
            "fragment": {
                "kind": "expression_statement",
                "expression": "audit()",
            },
            "target": {"kind": "function", "name": "f", "file": file, "field": "body", "nth_child": 0},
            "action": "insert_before",
        });
        let result = execute_step(&step, &[], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "def f():\n    audit()\n    return 1\n"
        );
    }

    #[test]
    fn routes_primitive_and_readonly() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def f():\n    return 1\n");

        let locate = json!({
            "op": "locate",
            "params": {"locator": {"kind": "function", "name": "f", "file": file}},
        });
        let result = execute_step(&locate, &[], RunOptions::default());
        assert_eq!(result["count"], 1);

        let replace = json!({
            "op": "replace_node",
            "params": {
                "locator": {"kind": "function", "name": "f", "file": file, "field": "body"},
                "replacement": "return 2",
            },
        });
        let result = execute_step(&replace, &[], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
    }

    #[test]
    fn routes_custom_composed_then_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "a = 1\nb = 2\n");

        // Legacy operator reached through the final dispatch stage.
        let step = json!({
            "op": "replace_code",
            "params": {"file": file, "pattern": "a = 1", "replacement": "a = 10"},
        });
        let result = execute_step(&step, &[], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");

        // A custom operator shadowing nothing.
        let custom = CustomOp {
            define: "bump_b".to_string(),
            params_schema: json!({"file": "string"}).as_object().cloned().unwrap(),
            steps: vec![json!({
                "primitive": "replace_all_matching",
                "params": {
                    "locator": {
                        "type": "sexp",
                        "query": "(integer) @n (#eq? @n \"2\")",
                        "capture": "n",
                        "file": "$file",
                    },
                    "replacement": "20",
                },
            })],
        };
        let step = json!({"op": "bump_b", "params": {"file": file}});
        let result = execute_step(&step, &[custom], RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "a = 10\nb = 20\n"
        );
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let step = json!({"op": "frobnicate", "params": {}});
        let result = execute_step(&step, &[], RunOptions::default());
        assert_eq!(result["success"], false);
        assert!(result["error"].as_str().unwrap().contains("unknown operator"));
    }
}
