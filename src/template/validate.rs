//! Template parameter validation.
//!
//! Each parameter kind has an executable validator. Expression and
//! statement parameters are checked by parsing a synthetic wrapper with
//! the target language's grammar; Rust targets additionally get a
//! second opinion from `syn`.

use crate::fragment::{validate_fragment, Fragment};
use crate::lang::Lang;
use crate::locate::Locator;
use crate::pool;
use crate::template::{ParamKind, Template};
use serde_json::Value;

/// Validate provided parameters against the template's slots. Defaults
/// are assumed to be applied by the caller; a missing optional slot is
/// fine, a missing required slot is an error.
pub fn validate_params(template: &Template, params: &Value, lang: Lang) -> Vec<String> {
    let mut errors = Vec::new();

    for slot in template.params {
        let value = params.get(slot.name);
        let Some(value) = value else {
            if slot.required {
                errors.push(format!("missing required parameter: {}", slot.name));
            }
            continue;
        };

        match slot.kind {
            ParamKind::Identifier => {
                let ok = value
                    .as_str()
                    .map(|s| is_identifier(lang, s))
                    .unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "parameter '{}' is not a valid identifier: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::Expression => {
                let ok = value
                    .as_str()
                    .map(|s| parses_as_expression(lang, s))
                    .unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "parameter '{}' is not a valid expression: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::Statement => {
                let ok = value
                    .as_str()
                    .map(|s| parses_as_statement(lang, s))
                    .unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "parameter '{}' is not a valid statement: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::TypeAnnotation => {
                let ok = value.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "parameter '{}' is not a valid type annotation: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::Locator => {
                if serde_json::from_value::<Locator>(value.clone()).is_err() {
                    errors.push(format!(
                        "parameter '{}' is not a valid locator: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::Fragment => match serde_json::from_value::<Fragment>(value.clone()) {
                Ok(frag) => {
                    for e in validate_fragment(&frag) {
                        errors.push(format!("parameter '{}': {e}", slot.name));
                    }
                }
                Err(e) => {
                    errors.push(format!("parameter '{}' is not a valid fragment: {e}", slot.name));
                }
            },
            ParamKind::IdentifierList => {
                let ok = match value {
                    Value::Array(items) => items
                        .iter()
                        .all(|v| v.as_str().map(|s| is_identifier(lang, s)).unwrap_or(false)),
                    Value::String(s) => s.split(',').all(|p| is_identifier(lang, p.trim())),
                    _ => false,
                };
                if !ok {
                    errors.push(format!(
                        "parameter '{}' is not a list of valid identifiers: {}",
                        slot.name,
                        short(value)
                    ));
                }
            }
            ParamKind::Enum(allowed) => {
                let ok = value
                    .as_str()
                    .map(|s| allowed.contains(&s))
                    .unwrap_or(false);
                if !ok {
                    errors.push(format!(
                        "parameter '{}' must be one of {:?}, got: {}",
                        slot.name,
                        allowed,
                        short(value)
                    ));
                }
            }
        }
    }

    errors
}

fn short(value: &Value) -> String {
    let s = match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    };
    if s.len() > 80 {
        format!("{}...", &s[..s.char_indices().take_while(|(i, _)| *i < 77).last().map(|(i, c)| i + c.len_utf8()).unwrap_or(0)])
    } else {
        s
    }
}

/// A valid identifier in the target language: leading alpha or
/// underscore, alphanumeric tail, not a keyword.
pub fn is_identifier(lang: Lang, s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_') {
        return false;
    }
    !lang.keywords().contains(&s)
}

/// Check that text parses as an expression by wrapping it in a
/// synthetic assignment and parsing with the language grammar.
pub fn parses_as_expression(lang: Lang, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if lang == Lang::Rust && syn::parse_str::<syn::Expr>(text).is_err() {
        return false;
    }
    let wrapped = match lang {
        Lang::Python | Lang::Ruby => format!("_graft = ({text})\n"),
        Lang::JavaScript | Lang::TypeScript => format!("let _graft = ({text});\n"),
        Lang::Java => format!("class _T {{ void m() {{ var _graft = ({text}); }} }}\n"),
        Lang::Go => format!("package p\n\nfunc _m() {{ _graft := ({text}) }}\n"),
        Lang::Rust => format!("fn _m() {{ let _graft = ({text}); }}\n"),
        Lang::Php => format!("<?php $_graft = ({text});\n"),
        Lang::C | Lang::Cpp => format!("void _m(void) {{ int _graft = ({text}); }}\n"),
    };
    parses_clean(lang, &wrapped)
}

/// Check that text parses as one or more statements.
pub fn parses_as_statement(lang: Lang, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if lang == Lang::Rust
        && syn::parse_str::<syn::Block>(&format!("{{ {text} }}")).is_err()
    {
        return false;
    }
    let wrapped = match lang {
        Lang::Python | Lang::Ruby => format!("{text}\n"),
        Lang::JavaScript | Lang::TypeScript => format!("function _f() {{ {text} }}\n"),
        Lang::Java => format!("class _T {{ void m() {{ {text} }} }}\n"),
        Lang::Go => format!("package p\n\nfunc _m() {{ {text} }}\n"),
        Lang::Rust => format!("fn _m() {{ {text} }}\n"),
        Lang::Php => format!("<?php {text}\n"),
        Lang::C | Lang::Cpp => format!("void _m(void) {{ {text} }}\n"),
    };
    parses_clean(lang, &wrapped)
}

fn parses_clean(lang: Lang, source: &str) -> bool {
    pool::with_parser(lang, |p| {
        p.parse_with_source(source)
            .map(|parsed| parsed.parses_ok())
            .unwrap_or(false)
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lookup;
    use serde_json::json;

    #[test]
    fn identifier_validation() {
        assert!(is_identifier(Lang::Python, "value"));
        assert!(is_identifier(Lang::Python, "_private"));
        assert!(!is_identifier(Lang::Python, "2fast"));
        assert!(!is_identifier(Lang::Python, "with space"));
        assert!(!is_identifier(Lang::Python, "class"));
        assert!(!is_identifier(Lang::Rust, "fn"));
    }

    #[test]
    fn expression_validation_python() {
        assert!(parses_as_expression(Lang::Python, "x is None"));
        assert!(parses_as_expression(Lang::Python, "len(items) > 0"));
        assert!(!parses_as_expression(Lang::Python, "if x >"));
        assert!(!parses_as_expression(Lang::Python, ""));
    }

    #[test]
    fn expression_validation_rust() {
        assert!(parses_as_expression(Lang::Rust, "x + 1"));
        assert!(parses_as_expression(Lang::Rust, "items.len() > 0"));
        assert!(!parses_as_expression(Lang::Rust, "let x ="));
    }

    #[test]
    fn statement_validation() {
        assert!(parses_as_statement(Lang::Python, "return None"));
        assert!(parses_as_statement(Lang::Python, "raise ValueError('bad')"));
        assert!(!parses_as_statement(Lang::Python, "def f(:"));
        assert!(parses_as_statement(Lang::Rust, "let x = 1;"));
    }

    #[test]
    fn guard_clause_params() {
        let template = lookup("guard_clause").unwrap();
        let good = json!({
            "condition": "x is None",
            "guard_body": "return None",
            "target": {"kind": "function", "name": "f", "file": "m.py", "field": "body"},
        });
        assert!(validate_params(template, &good, Lang::Python).is_empty());

        let bad = json!({
            "condition": "if x >",
            "guard_body": "return None",
            "target": {"kind": "function", "name": "f", "file": "m.py"},
        });
        let errors = validate_params(template, &bad, Lang::Python);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'condition' is not a valid expression"));
    }

    #[test]
    fn missing_required_parameter() {
        let template = lookup("guard_clause").unwrap();
        let errors = validate_params(template, &json!({"condition": "x"}), Lang::Python);
        assert!(errors.iter().any(|e| e.contains("guard_body")));
        assert!(errors.iter().any(|e| e.contains("target")));
    }

    #[test]
    fn enum_membership() {
        let template = lookup("add_conditional_branch").unwrap();
        let bad = json!({
            "if_target": {"kind": "statement", "file": "m.py"},
            "branch_type": "maybe",
            "branch_body": "pass",
        });
        let errors = validate_params(template, &bad, Lang::Python);
        assert!(errors.iter().any(|e| e.contains("branch_type")));
    }

    #[test]
    fn fragment_parameter() {
        let template = lookup("replace_function_body").unwrap();
        let good = json!({
            "function": {"kind": "function", "name": "f", "file": "m.py"},
            "new_body": {
                "kind": "return_statement",
                "value": "42",
            },
        });
        assert!(validate_params(template, &good, Lang::Python).is_empty());

        let bad = json!({
            "function": {"kind": "function", "name": "f", "file": "m.py"},
            "new_body": {"kind": "if_statement"},
        });
        let errors = validate_params(template, &bad, Lang::Python);
        assert!(errors.iter().any(|e| e.contains("condition")));
    }
}
