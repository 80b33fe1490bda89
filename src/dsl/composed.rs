//! Composed operators: named sequences of primitive (or further
//! composed) steps, expanded with parameter substitution.
//!
//! Built-ins cover the common class/import insertions. Plan-defined
//! operators arrive via `define_operators` and live only for the
//! executing plan; their actual parameters are type-checked against the
//! declared schema before expansion.

use crate::dsl::{eval_condition, substitute, Scope};
use crate::edit::FileSnapshot;
use crate::legacy;
use crate::prim::{self, PrimOutcome, RunOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// A plan-defined composed operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomOp {
    pub define: String,
    #[serde(default)]
    pub params_schema: Map<String, Value>,
    #[serde(default)]
    pub steps: Vec<Value>,
}

pub const BUILTIN_COMPOSED_NAMES: &[&str] = &["add_method", "add_import", "add_class_attribute"];

pub fn is_builtin_composed(name: &str) -> bool {
    BUILTIN_COMPOSED_NAMES.contains(&name)
}

/// Built-in composed operators expressed as DSL step sequences.
fn builtin_ops() -> &'static Map<String, Value> {
    static OPS: OnceLock<Map<String, Value>> = OnceLock::new();
    OPS.get_or_init(|| {
        let value = json!({
            "add_method": {
                "params_schema": {"file": "string", "class_name": "string", "method_code": "string"},
                "steps": [
                    {"primitive": "insert_after_node", "params": {
                        "locator": {"kind": "class", "name": "$class_name", "file": "$file",
                                    "field": "body", "nth_child": -1},
                        "code": "$method_code",
                        "separator": "\n",
                    }},
                ],
            },
            "add_import": {
                "params_schema": {"file": "string", "import_statement": "string"},
                "steps": [
                    {"primitive": "insert_after_node", "params": {
                        "locator": {"kind": "import", "file": "$file", "index": -1},
                        "code": "$import_statement",
                    }},
                ],
            },
            "add_class_attribute": {
                "params_schema": {"file": "string", "class_name": "string", "attribute_code": "string"},
                "steps": [
                    {"primitive": "insert_before_node", "params": {
                        "locator": {"kind": "class", "name": "$class_name", "file": "$file",
                                    "field": "body", "nth_child": 0},
                        "code": "$attribute_code",
                    }},
                ],
            },
        });
        value.as_object().cloned().expect("builtin table is an object")
    })
}

/// Expand a composed operator to its DSL steps and parameter scope.
/// Custom definitions shadow built-ins of the same name.
pub fn expand_composed_operator(
    name: &str,
    params: &Value,
    custom_ops: &[CustomOp],
) -> Result<(Vec<Value>, Scope), String> {
    let (schema, steps) = if let Some(custom) = custom_ops.iter().find(|c| c.define == name) {
        (custom.params_schema.clone(), custom.steps.clone())
    } else if let Some(def) = builtin_ops().get(name) {
        let schema = def
            .get("params_schema")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let steps = def
            .get("steps")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        (schema, steps)
    } else {
        return Err(format!("unknown composed operator: {name}"));
    };

    let scope: Scope = params.as_object().cloned().unwrap_or_default();
    check_schema(name, &schema, &scope)?;
    Ok((steps, scope))
}

/// Type-check actual parameters against a declared schema. Schema values
/// are type names: `string`, `int`, `bool`, `locator`, `list`, `object`,
/// `any`.
fn check_schema(op: &str, schema: &Map<String, Value>, scope: &Scope) -> Result<(), String> {
    for (param, decl) in schema {
        let expected = decl.as_str().unwrap_or("any");
        let Some(value) = scope.get(param) else {
            return Err(format!("{op}: missing parameter '{param}' ({expected})"));
        };
        let ok = match expected {
            "string" => value.is_string(),
            "int" | "integer" => value.is_i64() || value.is_u64(),
            "bool" => value.is_boolean(),
            "locator" | "object" => value.is_object(),
            "list" => value.is_array(),
            _ => true,
        };
        if !ok {
            return Err(format!(
                "{op}: parameter '{param}' must be {expected}, got {value}"
            ));
        }
    }
    Ok(())
}

/// Execute a composed operator: expand, run the steps, and restore the
/// target file if a later step fails after an earlier one committed.
pub fn execute_composed_op(
    name: &str,
    params: &Value,
    custom_ops: &[CustomOp],
    opts: RunOptions<'_>,
) -> PrimOutcome {
    let (steps, mut scope) = match expand_composed_operator(name, params, custom_ops) {
        Ok(pair) => pair,
        Err(e) => return PrimOutcome::failure(e),
    };
    if steps.is_empty() {
        return PrimOutcome::failure(format!("composed operator '{name}' has no steps"));
    }

    let snapshot = params
        .get("file")
        .and_then(Value::as_str)
        .and_then(|f| FileSnapshot::capture(f).ok());

    debug!(op = name, steps = steps.len(), "composed operator expansion");
    let results = execute_dsl_steps(&steps, &mut scope, custom_ops, opts);

    let first_failure = results
        .iter()
        .find(|r| r.get("success") != Some(&Value::Bool(true)));
    if let Some(failure) = first_failure {
        let error = failure
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("step failed")
            .to_string();

        let mut rolled_back = None;
        if let Some(snapshot) = &snapshot {
            if snapshot.is_dirty().unwrap_or(false) && snapshot.restore().is_ok() {
                rolled_back = Some(true);
            }
        }

        // The stock import insertion needs at least one existing import
        // to anchor on; fall back to the top-of-file insertion path.
        if name == "add_import" {
            let fallback = legacy::execute_legacy("add_import", params, opts);
            if fallback.success {
                return fallback;
            }
        }

        return PrimOutcome {
            success: false,
            error: Some(format!("{name}: {error}")),
            rolled_back,
            warnings: Vec::new(),
            result: Some(json!({ "results": results })),
        };
    }

    let warnings = results
        .iter()
        .filter_map(|r| r.get("warnings").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();

    PrimOutcome {
        success: true,
        error: None,
        rolled_back: None,
        warnings,
        result: Some(json!({ "results": results })),
    }
}

/// Execute a sequence of DSL steps with variable resolution. Each step
/// is a primitive call, a composed-operator call, or a conditional.
/// Execution stops at the first failing mutating step.
pub fn execute_dsl_steps(
    steps: &[Value],
    vars: &mut Scope,
    custom_ops: &[CustomOp],
    opts: RunOptions<'_>,
) -> Vec<Value> {
    let mut results = Vec::new();

    for step in steps {
        // Conditional step
        if let Some(cond) = step.get("if") {
            let cond_str = match substitute(cond, vars) {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let branch = if eval_condition(&cond_str, vars) {
                step.get("then")
            } else {
                step.get("else")
            };
            if let Some(branch) = branch {
                let sub = execute_dsl_steps(
                    std::slice::from_ref(branch),
                    vars,
                    custom_ops,
                    opts,
                );
                results.extend(sub);
            }
            continue;
        }

        // Primitive step
        if let Some(prim_name) = step.get("primitive").and_then(Value::as_str) {
            let params = substitute(step.get("params").unwrap_or(&Value::Null), vars);
            let readonly = prim::READONLY_PRIMITIVES.contains(&prim_name);

            let outcome = if readonly {
                prim::execute_readonly(prim_name, &params)
            } else {
                serde_json::to_value(prim::execute_primitive(prim_name, &params, opts))
                    .unwrap_or_else(|_| json!({ "success": false }))
            };

            if let Some(bind) = step.get("bind").and_then(Value::as_str) {
                let bound = outcome.get("result").cloned().unwrap_or_else(|| outcome.clone());
                vars.insert(bind.to_string(), bound);
            }

            let failed = outcome.get("success") != Some(&Value::Bool(true));
            results.push(outcome);
            if failed && !readonly {
                break;
            }
            continue;
        }

        // Nested composed operator
        if let Some(op_name) = step.get("op").and_then(Value::as_str) {
            let params = substitute(step.get("params").unwrap_or(&Value::Null), vars);
            let outcome = execute_composed_op(op_name, &params, custom_ops, opts);
            let failed = !outcome.success;
            results.push(serde_json::to_value(outcome).unwrap_or_else(|_| json!({"success": false})));
            if failed {
                break;
            }
            continue;
        }

        results.push(json!({
            "success": false,
            "error": "DSL step must have 'primitive', 'op', or 'if'",
        }));
        break;
    }

    results
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
    fn builtin_add_method_appends_to_class_body() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(
            &dir,
            "m.py",
            "class Config:\n    def load(self):\n        return 1\n",
        );
        let params = json!({
            "file": file,
            "class_name": "Config",
            "method_code": "def save(self):\n    return 2",
        });
        let outcome = execute_composed_op("add_method", &params, &[], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        let content = fs::read_to_string(dir.path().join("m.py")).unwrap();
        assert_eq!(
            content,
            "class Config:\n    def load(self):\n        return 1\n\n    def save(self):\n        return 2\n"
        );
    }

    #[test]
    fn builtin_add_import_after_last_import() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "import os\nimport sys\n\nx = 1\n");
        let params = json!({
            "file": file,
            "import_statement": "import json",
        });
        let outcome = execute_composed_op("add_import", &params, &[], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "import os\nimport sys\nimport json\n\nx = 1\n"
        );
    }

    #[test]
    fn add_import_falls_back_when_no_imports_exist() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "x = 1\n");
        let params = json!({
            "file": file,
            "import_statement": "import json",
        });
        let outcome = execute_composed_op("add_import", &params, &[], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "import json\nx = 1\n"
        );
    }

    #[test]
    fn builtin_add_class_attribute_prepends_to_body() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(
            &dir,
            "m.py",
            "class Config:\n    def load(self):\n        return 1\n",
        );
        let params = json!({
            "file": file,
            "class_name": "Config",
            "attribute_code": "retries = 3",
        });
        let outcome =
            execute_composed_op("add_class_attribute", &params, &[], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "class Config:\n    retries = 3\n    def load(self):\n        return 1\n"
        );
    }

    #[test]
    fn custom_operator_expansion_and_schema_check() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def handler(event):\n    return event\n");
        let custom = CustomOp {
            define: "guard_handler".to_string(),
            params_schema: json!({"file": "string", "check": "string"})
                .as_object()
                .cloned()
                .unwrap(),
            steps: vec![json!({
                "primitive": "insert_before_node",
                "params": {
                    "locator": {"kind": "function", "name": "handler", "file": "$file",
                                "field": "body", "nth_child": 0},
                    "code": "if not $check:\n    return None",
                },
            })],
        };

        let params = json!({"file": file, "check": "event"});
        let outcome =
            execute_composed_op("guard_handler", &params, &[custom.clone()], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(
            fs::read_to_string(dir.path().join("m.py")).unwrap(),
            "def handler(event):\n    if not event:\n        return None\n    return event\n"
        );

        // Wrong type for a declared parameter is rejected before any edit.
        let bad = json!({"file": 42, "check": "event"});
        let outcome = execute_composed_op("guard_handler", &bad, &[custom], RunOptions::default());
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("'file' must be string"));
    }

    #[test]
    fn conditional_steps_with_binding() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(&dir, "m.py", "def f():\n    return 1\n");
        let custom = CustomOp {
            define: "annotate_if_found".to_string(),
            params_schema: json!({"file": "string"}).as_object().cloned().unwrap(),
            steps: vec![
                json!({
                    "primitive": "locate",
                    "params": {"locator": {"kind": "function", "name": "f", "file": "$file"}},
                    "bind": "probe",
                }),
                json!({
                    "if": "$probe.found",
                    "then": {
                        "primitive": "insert_before_node",
                        "params": {
                            "locator": {"kind": "function", "name": "f", "file": "$file"},
                            "code": "# checked",
                        },
                    },
                }),
            ],
        };

        let params = json!({"file": file});
        let outcome =
            execute_composed_op("annotate_if_found", &params, &[custom], RunOptions::default());
        assert!(outcome.success, "{:?}", outcome.error);
        let content = fs::read_to_string(dir.path().join("m.py")).unwrap();
        assert!(content.starts_with("# checked\n"));
    }

    #[test]
    fn unknown_composed_operator() {
        let outcome =
            execute_composed_op("mystery", &json!({}), &[], RunOptions::default());
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unknown composed operator"));
    }
}
