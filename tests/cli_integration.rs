//! Integration tests for the CLI surface: JSON in, JSON out, exit code
//! 0 on success and 1 on failure.

use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn graphplan() -> Command {
    Command::new(env!("CARGO_BIN_EXE_graphplan"))
}

fn parse_stdout(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {stdout}");
    })
}

#[test]
fn build_graph_reports_symbols_and_imports() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("m.py");
    fs::write(
        &file,
        "from os.path import join\n\nclass Loader:\n    def load(self):\n        return join('a', 'b')\n",
    )
    .unwrap();

    let output = graphplan()
        .args(["build_graph"])
        .arg(&file)
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let graph = parse_stdout(&output);
    let names: Vec<&str> = graph["symbols"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Loader"));
    assert!(names.contains(&"load"));
    assert_eq!(graph["imports"][0]["module"], "os.path");
    assert_eq!(graph["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn locate_outputs_node_metadata() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("m.py");
    fs::write(&file, "def f():\n    return 1\n").unwrap();

    let locator = format!(
        r#"{{"kind": "function", "name": "f", "file": "{}"}}"#,
        file.display()
    );
    let output = graphplan()
        .args(["locate", &locator])
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let result = parse_stdout(&output);
    assert_eq!(result["found"], true);
    assert_eq!(result["count"], 1);
    assert_eq!(result["nodes"][0]["kind"], "function_definition");
}

#[test]
fn locate_region_outputs_byte_range() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("m.py");
    fs::write(&file, "x = 1\ndef f():\n    return 1\n").unwrap();

    let locator = format!(
        r#"{{"kind": "function", "name": "f", "file": "{}"}}"#,
        file.display()
    );
    let output = graphplan()
        .args(["locate_region", &locator])
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let result = parse_stdout(&output);
    assert_eq!(result["start_byte"], 6);
    assert!(result["text"].as_str().unwrap().starts_with("def f"));
}

#[test]
fn execute_step_applies_template_and_exits_zero() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("m.py");
    fs::write(&file, "def f(x):\n    return x + 1\n").unwrap();

    let step = format!(
        r#"{{"template": "guard_clause", "params": {{
            "target": {{"kind": "function", "name": "f", "file": "{}", "field": "body"}},
            "condition": "x is None",
            "guard_body": "return None"
        }}}}"#,
        file.display()
    );
    let output = graphplan()
        .arg("--workspace")
        .arg(dir.path())
        .args(["execute_step", &step])
        .output()
        .expect("binary runs");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result = parse_stdout(&output);
    assert_eq!(result["success"], true);
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "def f(x):\n    if x is None:\n        return None\n    return x + 1\n"
    );
}

#[test]
fn execute_step_failure_exits_one() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("m.py");
    let original = "def f():\n    return 1\n";
    fs::write(&file, original).unwrap();

    let step = format!(
        r#"{{"op": "replace_node", "params": {{
            "locator": {{"kind": "function", "name": "missing", "file": "{}"}},
            "replacement": "pass"
        }}}}"#,
        file.display()
    );
    let output = graphplan()
        .arg("--workspace")
        .arg(dir.path())
        .args(["execute_step", &step])
        .output()
        .expect("binary runs");
    assert_eq!(output.status.code(), Some(1));

    let result = parse_stdout(&output);
    assert_eq!(result["success"], false);
    assert_eq!(fs::read_to_string(&file).unwrap(), original);
}

#[test]
fn verify_plan_detects_empty_plan() {
    let output = graphplan()
        .args([
            "verify_plan",
            "[]",
            r#"{"symbols": [], "imports": [], "line_kinds": {}, "errors": []}"#,
        ])
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let result = parse_stdout(&output);
    assert_eq!(result["passed"], false);
    assert!(result["errors"][0].as_str().unwrap().contains("empty"));
}

#[test]
fn verify_plan_reads_files_with_at_prefix() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("m.py");
    fs::write(&target, "def f():\n    return 1\n").unwrap();

    let plan_path = dir.path().join("plan.json");
    fs::write(
        &plan_path,
        format!(
            r#"[{{"op": "replace_code", "params": {{
                "file": "{}", "pattern": "return 1", "replacement": "return 2"
            }}}}]"#,
            target.display()
        ),
    )
    .unwrap();

    let graph_path = dir.path().join("graph.json");
    fs::write(
        &graph_path,
        r#"{"symbols": [], "imports": [], "line_kinds": {}, "errors": []}"#,
    )
    .unwrap();

    let output = graphplan()
        .args([
            "verify_plan",
            &format!("@{}", plan_path.display()),
            &format!("@{}", graph_path.display()),
        ])
        .output()
        .expect("binary runs");
    assert!(output.status.success());

    let result = parse_stdout(&output);
    assert_eq!(result["passed"], true, "{result}");
    // Verification is read-only.
    assert_eq!(fs::read_to_string(&target).unwrap(), "def f():\n    return 1\n");
}
