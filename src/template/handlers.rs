//! Template handlers: code construction plus delegation to the L4
//! primitives. A handler that needs several coordinated spans composes
//! them in memory and commits through the shared postcondition path, so
//! a template step is all-or-nothing.

use crate::dsl;
use crate::edit::{apply_all, Edit};
use crate::fragment::{Fragment, FragmentStep};
use crate::lang::{Lang, NormKind};
use crate::locate::{node_in_string_or_comment, resolve_nodes, Locator, NodeSpan};
use crate::pool;
use crate::prim::ops::{indent_block, leading_indent, line_end, line_start, PlannedEdit};
use crate::prim::{self, PrimOutcome, RunOptions};
use crate::template::{lookup, validate_params, ParamKind, Template};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Templates whose generated surface syntax is indentation-based; other
/// targets are rejected with a parameter-validation error.
const PYTHON_ONLY: &[&str] = &[
    "guard_clause",
    "wrap_try_except",
    "wrap_context_manager",
    "add_method",
    "add_class_attribute",
    "add_conditional_branch",
    "add_import_and_use",
    "add_decorator",
    "replace_function_body",
    "extract_variable",
    "inline_variable",
];

/// Execute one Tier-2 template step.
pub fn execute_template(name: &str, raw_params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let Some(template) = lookup(name) else {
        return PrimOutcome::failure(format!("unknown template: {name}"));
    };

    let params = with_defaults(template, raw_params);

    let Some(file) = locator_file(template, &params) else {
        return PrimOutcome::failure(format!(
            "template '{name}': no file found in any locator parameter"
        ));
    };
    let Some(lang) = Lang::from_path(&file) else {
        return PrimOutcome::failure(format!("template '{name}': unsupported file type: {file}"));
    };

    let errors = validate_params(template, &params, lang);
    if !errors.is_empty() {
        return PrimOutcome::failure(format!("template '{name}': {}", errors.join("; ")));
    }

    if PYTHON_ONLY.contains(&name) && lang != Lang::Python {
        return PrimOutcome::failure(format!(
            "template '{name}' constructs indentation-syntax code and supports python targets only (got {})",
            lang.name()
        ));
    }

    debug!(template = name, file, "template dispatch");
    match name {
        "guard_clause" => guard_clause(&params, opts),
        "wrap_try_except" => wrap_try_except(&params, opts),
        "wrap_context_manager" => wrap_context_manager(&params, opts),
        "add_decorator" => add_decorator(&params, opts),
        "add_conditional_branch" => add_conditional_branch(&params, opts),
        "replace_expression" => replace_expression(&params, opts),
        "modify_condition" => modify_condition(&params, opts),
        "change_return_value" => change_return_value(&params, &file, lang, opts),
        "replace_function_body" => replace_function_body(&params, opts),
        "add_method" => add_method(&params, &file, opts),
        "add_class_attribute" => add_class_attribute(&params, &file, opts),
        "add_parameter" => add_parameter(&params, &file, lang, opts),
        "extract_variable" => extract_variable(&params, &file, lang, opts),
        "inline_variable" => inline_variable(&params, &file, lang, opts),
        "add_import_and_use" => add_import_and_use(&params, &file, lang, opts),
        other => PrimOutcome::failure(format!("unknown template: {other}")),
    }
}

fn with_defaults(template: &Template, raw: &Value) -> Value {
    let mut map: Map<String, Value> = raw.as_object().cloned().unwrap_or_default();
    for slot in template.params {
        if map.contains_key(slot.name) {
            continue;
        }
        if let Some(default) = slot.default {
            let value = match slot.kind {
                ParamKind::IdentifierList => {
                    Value::Array(default.split(',').map(|p| json!(p.trim())).collect())
                }
                _ => json!(default),
            };
            map.insert(slot.name.to_string(), value);
        }
    }
    Value::Object(map)
}

fn locator_file(template: &Template, params: &Value) -> Option<String> {
    for slot in template.params {
        if slot.kind != ParamKind::Locator {
            continue;
        }
        if let Some(file) = params
            .get(slot.name)
            .and_then(|v| v.get("file"))
            .and_then(Value::as_str)
        {
            if !file.is_empty() {
                return Some(file.to_string());
            }
        }
    }
    None
}

fn str_of<'v>(params: &'v Value, key: &str) -> &'v str {
    params.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn opt_str<'v>(params: &'v Value, key: &str) -> Option<&'v str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn locator_of(params: &Value, key: &str) -> Locator {
    params
        .get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Resolve the first node a locator addresses in the given file.
fn resolve_first(file: &str, locator: &Locator) -> Result<(String, NodeSpan), String> {
    let lang = Lang::from_path(file).ok_or_else(|| format!("unsupported file type: {file}"))?;
    let source =
        std::fs::read_to_string(file).map_err(|e| format!("cannot read {file}: {e}"))?;
    let span = pool::with_parser(lang, |p| {
        let parsed = p.parse_with_source(&source)?;
        Ok::<_, crate::parse::ParseError>(
            crate::locate::resolve(locator, &parsed)?.into_iter().next(),
        )
    })
    .map_err(|e| e.to_string())?
    .map_err(|e| e.to_string())?;
    match span {
        Some(span) => Ok((source, span)),
        None => Err(format!("node not found: {}", locator.describe())),
    }
}

// --- Adding code ---------------------------------------------------------

fn guard_clause(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let code = format!(
        "if {}:\n{}",
        str_of(params, "condition"),
        indent_block(str_of(params, "guard_body"), "    ")
    );
    let call = json!({ "locator": locator_of(params, "target"), "code": code });
    prim::execute_primitive("insert_before_node", &call, opts)
}

fn add_decorator(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let code = format!("@{}", str_of(params, "decorator"));
    let call = json!({ "locator": locator_of(params, "target"), "code": code });
    prim::execute_primitive("insert_before_node", &call, opts)
}

fn add_conditional_branch(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let branch_type = str_of(params, "branch_type");
    let body = indent_block(str_of(params, "branch_body"), "    ");
    let code = match branch_type {
        "elif" => match opt_str(params, "condition") {
            Some(cond) => format!("elif {cond}:\n{body}"),
            None => {
                return PrimOutcome::failure(
                    "template 'add_conditional_branch': branch_type 'elif' requires 'condition'",
                )
            }
        },
        _ => format!("else:\n{body}"),
    };
    let call = json!({ "locator": locator_of(params, "if_target"), "code": code });
    prim::execute_primitive("insert_after_node", &call, opts)
}

fn add_method(params: &Value, file: &str, opts: RunOptions<'_>) -> PrimOutcome {
    let class_locator = locator_of(params, "class_locator");
    let Some(class_name) = class_locator.name.clone() else {
        return PrimOutcome::failure("template 'add_method': class locator must carry a name");
    };
    let method_name = str_of(params, "method_name");

    if let Ok(source) = std::fs::read_to_string(file) {
        let pattern = Regex::new(&format!(r"\bdef\s+{}\s*\(", regex::escape(method_name)))
            .expect("method pattern is valid");
        if pattern.is_match(&source) {
            return PrimOutcome::failure(format!(
                "template 'add_method': method '{method_name}' already exists in {file}"
            ));
        }
    }

    let param_list: Vec<String> = match params.get("parameters") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => vec!["self".to_string()],
    };

    let mut method_code = String::new();
    if let Some(dec) = opt_str(params, "decorator") {
        method_code.push_str(&format!("@{dec}\n"));
    }
    method_code.push_str(&format!(
        "def {method_name}({}):\n{}",
        param_list.join(", "),
        indent_block(str_of(params, "body"), "    ")
    ));

    let call = json!({
        "file": file,
        "class_name": class_name,
        "method_code": method_code,
    });
    dsl::execute_composed_op("add_method", &call, &[], opts)
}

fn add_class_attribute(params: &Value, file: &str, opts: RunOptions<'_>) -> PrimOutcome {
    let class_locator = locator_of(params, "class_locator");
    let Some(class_name) = class_locator.name.clone() else {
        return PrimOutcome::failure(
            "template 'add_class_attribute': class locator must carry a name",
        );
    };
    let attr_name = str_of(params, "attr_name");

    if let Ok(source) = std::fs::read_to_string(file) {
        let pattern = Regex::new(&format!(r"(?m)^\s*{}\s*[:=]", regex::escape(attr_name)))
            .expect("attribute pattern is valid");
        if pattern.is_match(&source) {
            return PrimOutcome::failure(format!(
                "template 'add_class_attribute': attribute '{attr_name}' already defined in {file}"
            ));
        }
    }

    let attribute_code = match opt_str(params, "type_annotation") {
        Some(ann) => format!("{attr_name}: {ann} = {}", str_of(params, "attr_value")),
        None => format!("{attr_name} = {}", str_of(params, "attr_value")),
    };

    let call = json!({
        "file": file,
        "class_name": class_name,
        "attribute_code": attribute_code,
    });
    dsl::execute_composed_op("add_class_attribute", &call, &[], opts)
}

fn add_parameter(params: &Value, file: &str, lang: Lang, opts: RunOptions<'_>) -> PrimOutcome {
    let mut locator = locator_of(params, "function");
    locator.field = Some("parameters".to_string());

    let (source, span) = match resolve_first(file, &locator) {
        Ok(pair) => pair,
        Err(e) => return PrimOutcome::failure(format!("template 'add_parameter': {e}")),
    };
    let text = &source[span.start_byte..span.end_byte];
    let inner = text
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_string();

    let param_name = str_of(params, "param_name");
    let already = Regex::new(&format!(r"\b{}\b", regex::escape(param_name)))
        .expect("param pattern is valid");
    if already.is_match(&inner) {
        return PrimOutcome::failure(format!(
            "template 'add_parameter': parameter '{param_name}' already exists"
        ));
    }

    let annotation = opt_str(params, "type_annotation");
    let default_value = opt_str(params, "default_value");
    if lang != Lang::Python && (annotation.is_some() || default_value.is_some()) {
        return PrimOutcome::failure(
            "template 'add_parameter': type annotations and defaults are supported for python targets only",
        );
    }

    let mut new_param = param_name.to_string();
    if let Some(ann) = annotation {
        new_param.push_str(&format!(": {ann}"));
    }
    if let Some(default) = default_value {
        new_param.push_str(&format!(" = {default}"));
    }

    let new_inner = if inner.is_empty() {
        new_param
    } else if str_of(params, "position") == "start" {
        format!("{new_param}, {inner}")
    } else {
        format!("{inner}, {new_param}")
    };

    let call = json!({
        "locator": locator,
        "replacement": format!("({new_inner})"),
    });
    prim::execute_primitive("replace_node", &call, opts)
}

fn add_import_and_use(params: &Value, file: &str, lang: Lang, opts: RunOptions<'_>) -> PrimOutcome {
    let module = str_of(params, "module");
    let symbol = str_of(params, "symbol");
    let usage_expression = str_of(params, "usage_expression");

    if !usage_expression.contains(symbol) {
        return PrimOutcome::failure(format!(
            "template 'add_import_and_use': usage_expression must reference '{symbol}'"
        ));
    }

    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
    };
    let import_stmt = format!("from {module} import {symbol}");

    let mut edits = Vec::new();
    if !source.contains(&import_stmt) {
        let last_import = Locator {
            kind: "import".to_string(),
            file: file.to_string(),
            index: Some(-1),
            ..Default::default()
        };
        let insert_at = match resolve_first(file, &last_import) {
            Ok((_, span)) => line_end(&source, span.end_byte.saturating_sub(1)),
            Err(_) => 0,
        };
        edits.push(Edit::new(
            file,
            insert_at,
            insert_at,
            format!("{import_stmt}\n"),
            "",
        ));
    }

    let usage_target = locator_of(params, "usage_target");
    let (_, usage_span) = match resolve_first(file, &usage_target) {
        Ok(pair) => pair,
        Err(e) => return PrimOutcome::failure(format!("template 'add_import_and_use': {e}")),
    };
    edits.push(Edit::new(
        file,
        usage_span.start_byte,
        usage_span.end_byte,
        usage_expression,
        &source[usage_span.start_byte..usage_span.end_byte],
    ));

    let edit_start = edits.iter().map(|e| e.byte_start).min().unwrap_or(0);
    let old_edit_end = edits.iter().map(|e| e.byte_end).max().unwrap_or(0);
    let delta: i64 = edits
        .iter()
        .map(|e| e.new_text.len() as i64 - (e.byte_end - e.byte_start) as i64)
        .sum();

    let new_content = match apply_all(&source, edits) {
        Ok(c) => c,
        Err(e) => return PrimOutcome::failure(format!("template 'add_import_and_use': {e}")),
    };

    let planned = PlannedEdit {
        new_content,
        edit_start,
        old_edit_end,
        new_edit_end: (old_edit_end as i64 + delta).max(0) as usize,
        replaced_kind: None,
        replacement_text: Some(usage_expression.to_string()),
        original_span_text: None,
        result: json!({ "import": import_stmt, "language": lang.name() }),
    };
    prim::commit_planned("add_import_and_use", file, planned, opts)
}

// --- Modifying code ------------------------------------------------------

fn replace_expression(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let call = json!({
        "locator": locator_of(params, "target"),
        "replacement": str_of(params, "new_expression"),
    });
    let run = RunOptions {
        expect_kind_change: true,
        ..opts
    };
    prim::execute_primitive("replace_node", &call, run)
}

fn modify_condition(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let mut locator = locator_of(params, "target");
    if locator.field.is_none() {
        locator.field = Some("condition".to_string());
    }
    let call = json!({
        "locator": locator,
        "replacement": str_of(params, "new_condition"),
    });
    let run = RunOptions {
        expect_kind_change: true,
        ..opts
    };
    prim::execute_primitive("replace_node", &call, run)
}

fn change_return_value(params: &Value, file: &str, _lang: Lang, opts: RunOptions<'_>) -> PrimOutcome {
    let locator = locator_of(params, "target");
    let (source, span) = match resolve_first(file, &locator) {
        Ok(pair) => pair,
        Err(e) => return PrimOutcome::failure(format!("template 'change_return_value': {e}")),
    };
    let original = &source[span.start_byte..span.end_byte];
    if !original.trim_start().starts_with("return") {
        return PrimOutcome::failure(format!(
            "template 'change_return_value': target is not a return statement: '{}'",
            original.trim()
        ));
    }
    let semicolon = if original.trim_end().ends_with(';') { ";" } else { "" };
    let call = json!({
        "locator": locator,
        "replacement": format!("return {}{semicolon}", str_of(params, "new_value")),
    });
    prim::execute_primitive("replace_node", &call, opts)
}

fn replace_function_body(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let fragment: Fragment = match params
        .get("new_body")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(f)) => f,
        _ => return PrimOutcome::failure("template 'replace_function_body': invalid fragment"),
    };
    let mut target = locator_of(params, "function");
    target.field = Some("body".to_string());
    let step = FragmentStep {
        fragment,
        target,
        action: "replace".to_string(),
    };
    crate::fragment::execute_fragment(&step, opts)
}

// --- Wrapping code -------------------------------------------------------

fn wrap_try_except(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let exception_type = str_of(params, "exception_type");
    let handler = indent_block(str_of(params, "handler_body"), "    ");
    let after = match opt_str(params, "exception_var") {
        Some(var) => format!("except {exception_type} as {var}:\n{handler}"),
        None => format!("except {exception_type}:\n{handler}"),
    };
    let call = json!({
        "locator": locator_of(params, "target"),
        "before": "try:",
        "after": after,
        "indent_body": true,
    });
    prim::execute_primitive("wrap_node", &call, opts)
}

fn wrap_context_manager(params: &Value, opts: RunOptions<'_>) -> PrimOutcome {
    let context_expr = str_of(params, "context_expr");
    let before = match opt_str(params, "as_var") {
        Some(var) => format!("with {context_expr} as {var}:"),
        None => format!("with {context_expr}:"),
    };
    let call = json!({
        "locator": locator_of(params, "target"),
        "before": before,
        "after": "",
        "indent_body": true,
    });
    prim::execute_primitive("wrap_node", &call, opts)
}

// --- Restructuring -------------------------------------------------------

fn extract_variable(params: &Value, file: &str, lang: Lang, opts: RunOptions<'_>) -> PrimOutcome {
    let variable_name = str_of(params, "variable_name");
    let target = locator_of(params, "target");

    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
    };

    let shadow = Regex::new(&format!(r"\b{}\b", regex::escape(variable_name)))
        .expect("variable pattern is valid");
    if shadow.is_match(&source) {
        return PrimOutcome::failure(format!(
            "template 'extract_variable': name '{variable_name}' is already in use in {file}"
        ));
    }

    let statement_kinds = lang.native_kinds(NormKind::Statement);
    let resolved = pool::with_parser(lang, |p| -> Result<Option<(NodeSpan, NodeSpan)>, crate::parse::ParseError> {
        let parsed = p.parse_with_source(&source)?;
        let nodes = resolve_nodes(&target, &parsed)?;
        let Some(expr) = nodes.first().copied() else {
            return Ok(None);
        };
        let mut ancestor = expr.parent();
        let stmt = loop {
            match ancestor {
                Some(node) if statement_kinds.contains(&node.kind()) => break Some(node),
                Some(node) => ancestor = node.parent(),
                None => break None,
            }
        };
        Ok(stmt.map(|s| (NodeSpan::of(expr), NodeSpan::of(s))))
    });

    let (expr_span, stmt_span) = match resolved {
        Ok(Ok(Some(pair))) => pair,
        Ok(Ok(None)) => {
            return PrimOutcome::failure(format!(
                "template 'extract_variable': no enclosing statement for {}",
                target.describe()
            ))
        }
        Ok(Err(e)) | Err(e) => return PrimOutcome::failure(e.to_string()),
    };

    let indent = leading_indent(&source, stmt_span.start_byte).to_string();
    let ls = line_start(&source, stmt_span.start_byte);
    let expr_text = source[expr_span.start_byte..expr_span.end_byte].to_string();
    let assignment = format!("{indent}{variable_name} = {expr_text}\n");

    let mut content = String::with_capacity(source.len() + assignment.len());
    content.push_str(&source[..ls]);
    content.push_str(&assignment);
    content.push_str(&source[ls..]);

    // The expression moved down by the inserted line; replace it at its
    // shifted offsets.
    let shift = assignment.len();
    let (es, ee) = (expr_span.start_byte + shift, expr_span.end_byte + shift);
    content.replace_range(es..ee, variable_name);

    let planned = PlannedEdit {
        new_content: content,
        edit_start: ls,
        old_edit_end: expr_span.end_byte,
        new_edit_end: es + variable_name.len(),
        replaced_kind: None,
        replacement_text: Some(format!("{variable_name} = {expr_text}")),
        original_span_text: None,
        result: json!({
            "variable": variable_name,
            "inserted_at_line": stmt_span.start_line,
        }),
    };
    prim::commit_planned("extract_variable", file, planned, opts)
}

fn inline_variable(params: &Value, file: &str, lang: Lang, opts: RunOptions<'_>) -> PrimOutcome {
    let variable_name = str_of(params, "variable_name").to_string();
    let target = locator_of(params, "target");

    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => return PrimOutcome::failure(format!("cannot read {file}: {e}")),
    };

    struct InlinePlan {
        stmt_start: usize,
        stmt_end: usize,
        value_text: String,
        references: Vec<(usize, usize)>,
        assignment_count: usize,
    }

    let plan = pool::with_parser(lang, |p| -> Result<Result<InlinePlan, String>, crate::parse::ParseError> {
        let parsed = p.parse_with_source(&source)?;
        let nodes = resolve_nodes(&target, &parsed)?;
        let Some(mut node) = nodes.first().copied() else {
            return Ok(Err(format!("node not found: {}", target.describe())));
        };
        // The locator may address the wrapping expression_statement.
        if node.kind() != "assignment" {
            let mut cursor = node.walk();
            let inner = node.children(&mut cursor).find(|c| c.kind() == "assignment");
            match inner {
                Some(inner) => node = inner,
                None => return Ok(Err("target is not an assignment statement".to_string())),
            }
        }

        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");
        let (Some(left), Some(right)) = (left, right) else {
            return Ok(Err("assignment has no target/value".to_string()));
        };
        if &source[left.byte_range()] != variable_name.as_str() {
            return Ok(Err(format!(
                "target assignment does not assign '{variable_name}'"
            )));
        }

        // Count assignments to this name across the file.
        let mut assignment_count = 0usize;
        let mut references = Vec::new();
        let stmt = node.parent().filter(|p| p.kind() == "expression_statement").unwrap_or(node);
        let mut stack = vec![parsed.root_node()];
        while let Some(n) = stack.pop() {
            if n.kind() == "assignment" {
                if let Some(l) = n.child_by_field_name("left") {
                    if &source[l.byte_range()] == variable_name.as_str() {
                        assignment_count += 1;
                    }
                }
            }
            if n.kind() == "identifier"
                && &source[n.byte_range()] == variable_name.as_str()
                && !node_in_string_or_comment(n)
                && (n.start_byte() < stmt.start_byte() || n.end_byte() > stmt.end_byte())
            {
                references.push((n.start_byte(), n.end_byte()));
            }
            let mut cursor = n.walk();
            for child in n.children(&mut cursor) {
                stack.push(child);
            }
        }

        Ok(Ok(InlinePlan {
            stmt_start: stmt.start_byte(),
            stmt_end: stmt.end_byte(),
            value_text: source[right.byte_range()].to_string(),
            references,
            assignment_count,
        }))
    });

    let plan = match plan {
        Ok(Ok(Ok(p))) => p,
        Ok(Ok(Err(msg))) => return PrimOutcome::failure(format!("template 'inline_variable': {msg}")),
        Ok(Err(e)) | Err(e) => return PrimOutcome::failure(e.to_string()),
    };

    if plan.assignment_count != 1 {
        return PrimOutcome::failure(format!(
            "template 'inline_variable': '{variable_name}' is assigned {} times, expected exactly 1",
            plan.assignment_count
        ));
    }

    let ls = line_start(&source, plan.stmt_start);
    let le = line_end(&source, plan.stmt_end.saturating_sub(1).max(plan.stmt_start));

    let mut edits = vec![Edit::new(file, ls, le, "", &source[ls..le])];
    for (start, end) in &plan.references {
        edits.push(Edit::new(
            file,
            *start,
            *end,
            plan.value_text.clone(),
            &source[*start..*end],
        ));
    }

    let edit_start = edits.iter().map(|e| e.byte_start).min().unwrap_or(0);
    let old_edit_end = edits.iter().map(|e| e.byte_end).max().unwrap_or(0);
    let delta: i64 = edits
        .iter()
        .map(|e| e.new_text.len() as i64 - (e.byte_end - e.byte_start) as i64)
        .sum();
    let replaced = plan.references.len();

    let new_content = match apply_all(&source, edits) {
        Ok(c) => c,
        Err(e) => return PrimOutcome::failure(format!("template 'inline_variable': {e}")),
    };

    let planned = PlannedEdit {
        new_content,
        edit_start,
        old_edit_end,
        new_edit_end: (old_edit_end as i64 + delta).max(0) as usize,
        replaced_kind: None,
        replacement_text: None,
        original_span_text: None,
        result: json!({
            "inlined": variable_name,
            "references_replaced": replaced,
        }),
    };
    prim::commit_planned("inline_variable", file, planned, opts)
}
