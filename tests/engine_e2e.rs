//! End-to-end engine tests.
//!
//! Each scenario drives a full step through the router: parse, resolve,
//! precondition, edit, postcondition, atomic write. The invariant tests
//! at the bottom pin the contracts the rest of the system leans on:
//! parse preservation, bit-identical rollback, and locator freshness.

use graphplan::{build_graph, router, serialize_fragment, verify_plan, Fragment, RunOptions};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn read_file(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap()
}

#[test]
fn guard_insertion() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "def f(x):\n    return x + 1\n");

    let step = json!({
        "template": "guard_clause",
        "params": {
            "target": {"kind": "function", "name": "f", "file": file, "field": "body"},
            "condition": "x is None",
            "guard_body": "return None",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");

    assert_eq!(
        read_file(&dir, "m.py"),
        "def f(x):\n    if x is None:\n        return None\n    return x + 1\n"
    );
}

#[test]
fn condition_modification_leaves_body_untouched() {
    let dir = TempDir::new().unwrap();
    let file = write_file(
        &dir,
        "m.py",
        "if a and b:\n    important_work()\n    more_work()\n",
    );

    let step = json!({
        "template": "modify_condition",
        "params": {
            "target": {"kind": "statement", "file": file, "index": 0},
            "new_condition": "a and b and c",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");

    assert_eq!(
        read_file(&dir, "m.py"),
        "if a and b and c:\n    important_work()\n    more_work()\n"
    );
}

#[test]
fn rename_with_string_comment_filter() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "x = \"x\"  # keep\ny = x + 1\n");

    let step = json!({
        "op": "rename_identifier",
        "target": {
            "type": "sexp",
            "query": "(identifier) @id (#eq? @id \"x\")",
            "capture": "id",
            "file": file,
        },
        "new_name": "z",
        "filter": "not_in_string_or_comment",
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");

    assert_eq!(read_file(&dir, "m.py"), "z = \"x\"  # keep\ny = z + 1\n");
}

#[test]
fn kind_preservation_failure_restores_bytes() {
    let dir = TempDir::new().unwrap();
    let original = "def g():\n    return 1\n";
    let file = write_file(&dir, "m.py", original);

    let step = json!({
        "op": "replace_node",
        "params": {
            "locator": {"kind": "function", "name": "g", "file": file},
            "replacement": "g = 1",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], false);
    assert!(result["error"].as_str().unwrap().contains("L1"), "{result}");
    assert_eq!(read_file(&dir, "m.py"), original);
}

#[test]
fn fragment_round_trip_parses() {
    let frag: Fragment = serde_json::from_value(json!({
        "kind": "if_statement",
        "condition": "not ok",
        "children": [{"kind": "raise_statement", "value": "ValueError('x')"}],
    }))
    .unwrap();

    let text = serialize_fragment(&frag, 0);
    assert_eq!(text, "if not ok:\n    raise ValueError('x')");

    let mut parser = graphplan::LangParser::new(graphplan::Lang::Python).unwrap();
    let parsed = parser.parse_with_source(&text).unwrap();
    assert!(parsed.parses_ok());
}

#[test]
fn cross_file_rename_warns_about_importers() {
    let dir = TempDir::new().unwrap();
    let util = write_file(&dir, "util.py", "def helper():\n    return 1\n");
    let app = write_file(&dir, "app.py", "from util import helper\n\nhelper()\n");
    let worker = write_file(&dir, "worker.py", "from util import helper\n\nhelper()\n");

    let graph = build_graph(&[&util, &app, &worker]);
    let plan = json!([
        {"op": "rename_symbol", "params": {
            "file": util, "old_name": "helper", "new_name": "aux",
        }},
    ]);

    let report = verify_plan(&plan, &graph);
    assert!(report.passed, "{:?}", report.errors);
    let warning = report
        .warnings
        .iter()
        .find(|w| w.contains("imported by files not in this plan"))
        .expect("expected a cross-file warning");
    assert!(warning.contains("app.py") && warning.contains("worker.py"));
}

// --- Universal invariants ------------------------------------------------

#[test]
fn every_successful_plan_leaves_files_parseable() {
    let dir = TempDir::new().unwrap();
    let file = write_file(
        &dir,
        "m.py",
        "def load(path):\n    return open(path).read()\n\ndef save(path, data):\n    open(path, 'w').write(data)\n",
    );

    let steps = vec![
        json!({
            "template": "guard_clause",
            "params": {
                "target": {"kind": "function", "name": "load", "file": file, "field": "body"},
                "condition": "path is None",
                "guard_body": "return None",
            },
        }),
        json!({
            "template": "wrap_try_except",
            "params": {
                "target": {"kind": "statement", "file": file, "index": 3},
                "exception_type": "OSError",
                "handler_body": "pass",
            },
        }),
        json!({
            "op": "rename_identifier",
            "target": {
                "type": "sexp",
                "query": "(identifier) @id (#eq? @id \"data\")",
                "capture": "id",
                "file": file,
            },
            "new_name": "payload",
            "filter": "not_in_string_or_comment",
        }),
    ];

    for step in &steps {
        let result = router::execute_step(step, &[], RunOptions::default());
        assert_eq!(result["success"], true, "step failed: {step} -> {result}");
    }

    let content = read_file(&dir, "m.py");
    let mut parser = graphplan::LangParser::new(graphplan::Lang::Python).unwrap();
    assert!(parser.parse_with_source(&content).unwrap().parses_ok());
    assert!(content.contains("payload"));
    assert!(!content.contains("data"));
}

#[test]
fn failed_primitive_rollback_is_bit_identical() {
    let dir = TempDir::new().unwrap();
    let original = "def f():\n    return 1\n\ndef g():\n    return 2\n";
    let file = write_file(&dir, "m.py", original);

    // Syntax-breaking replacement: blocked at L0, nothing written.
    let step = json!({
        "op": "replace_node",
        "params": {
            "locator": {"kind": "function", "name": "f", "file": file},
            "replacement": "def f(:\n    broken",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], false);
    assert_eq!(
        fs::read(dir.path().join("m.py")).unwrap(),
        original.as_bytes()
    );
}

#[test]
fn locator_freshness_across_steps() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "def f(x):\n    return x\n");

    // Step 1 renames the function; step 2 addresses it by its NEW name,
    // which only works because resolution re-reads and re-parses.
    let rename = json!({
        "op": "rename_identifier",
        "target": {
            "type": "sexp",
            "query": "(identifier) @id (#eq? @id \"f\")",
            "capture": "id",
            "file": file,
        },
        "new_name": "transform",
    });
    let result = router::execute_step(&rename, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");

    let guard = json!({
        "template": "guard_clause",
        "params": {
            "target": {"kind": "function", "name": "transform", "file": file, "field": "body"},
            "condition": "x is None",
            "guard_body": "return None",
        },
    });
    let result = router::execute_step(&guard, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");

    let content = read_file(&dir, "m.py");
    assert!(content.starts_with("def transform(x):"));
    assert!(content.contains("if x is None:"));
}

#[test]
fn delete_node_rolls_back_when_locator_still_resolves() {
    let dir = TempDir::new().unwrap();
    // Two functions with the same name: deleting the first still leaves
    // a match for the same locator, so the postcondition must refuse.
    let original = "def dup():\n    return 1\n\ndef dup():\n    return 2\n";
    let file = write_file(&dir, "m.py", original);

    let step = json!({
        "op": "delete_node",
        "params": {
            "locator": {"kind": "function", "name": "dup", "file": file, "index": 0},
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], false, "{result}");
    assert_eq!(result["rolled_back"], true);
    assert_eq!(read_file(&dir, "m.py"), original);
}

#[test]
fn replace_all_end_state_is_offset_order_independent() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "v = v + v * v\n");

    let step = json!({
        "op": "replace_all_matching",
        "params": {
            "locator": {
                "type": "sexp",
                "query": "(identifier) @id (#eq? @id \"v\")",
                "capture": "id",
                "file": file,
            },
            "replacement": "value",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");
    assert_eq!(read_file(&dir, "m.py"), "value = value + value * value\n");
    assert_eq!(result["result"]["replaced_count"], 4);
}

#[test]
fn warnings_never_block_execution() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "def f(x):\n    return x\n");

    // The replacement references an undefined helper: L3/L4 warn, the
    // step still succeeds.
    let step = json!({
        "op": "replace_node",
        "params": {
            "locator": {"kind": "function", "name": "f", "file": file, "field": "body"},
            "replacement": "return totally_unknown_helper(x)",
        },
    });
    let result = router::execute_step(&step, &[], RunOptions::default());
    assert_eq!(result["success"], true, "{result}");
    let warnings = result["warnings"].as_array().unwrap();
    assert!(
        warnings
            .iter()
            .any(|w| w.as_str().unwrap().contains("totally_unknown_helper")),
        "{warnings:?}"
    );
}

#[test]
fn plan_with_custom_operator_executes() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "m.py", "def process(data):\n    return data\n");

    let plan = json!({
        "define_operators": [{
            "define": "add_input_guard",
            "params_schema": {"file": "string", "func": "string"},
            "steps": [{
                "primitive": "insert_before_node",
                "params": {
                    "locator": {"kind": "function", "name": "$func", "file": "$file",
                                "field": "body", "nth_child": 0},
                    "code": "if $func is None:\n    return None",
                },
            }],
        }],
        "plan": [
            {"op": "add_input_guard", "params": {"file": file, "func": "process"}},
        ],
    });

    let (custom_ops, steps) = graphplan::parse_plan(&plan).unwrap();
    for step in &steps {
        let result = router::execute_step(step, &custom_ops, RunOptions::default());
        assert_eq!(result["success"], true, "{result}");
    }
    // "$func" interpolates into both the locator and the guard body.
    assert_eq!(
        read_file(&dir, "m.py"),
        "def process(data):\n    if process is None:\n        return None\n    return data\n"
    );
}
