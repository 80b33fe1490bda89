//! The plan DSL: variable substitution, sequenced and conditional
//! steps, and step-to-variable binding.
//!
//! Composed operators (built-in and plan-defined) expand to sequences
//! of DSL steps; the interpreter resolves `$var` references against the
//! operator's parameter scope and executes each step through the
//! primitive layer.

pub mod composed;

pub use composed::{execute_composed_op, is_builtin_composed, CustomOp};

use serde_json::{Map, Value};

/// A variable scope: parameter names to JSON values. Owned by the
/// executing plan; steps hold it only for the duration of expansion.
pub type Scope = Map<String, Value>;

/// Resolve `$var` references in a JSON template.
///
/// Three shapes are handled inside strings:
/// - `"$var"` (the entire string) — the variable's value as-is, deep
///   copied, preserving its JSON type;
/// - `"prefix $var suffix"` — string interpolation;
/// - `"$var.field"` / `"$var.0"` — field or index lookup into object
///   and array values.
///
/// Objects and arrays are resolved recursively. Unknown variables are
/// left verbatim so the downstream validator can report them.
pub fn substitute(template: &Value, vars: &Scope) -> Value {
    match template {
        Value::String(s) => substitute_string(s, vars),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, vars)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, vars)).collect()),
        other => other.clone(),
    }
}

fn substitute_string(s: &str, vars: &Scope) -> Value {
    // Whole-string reference: preserve the value's type.
    if let Some(name) = s.strip_prefix('$') {
        if !name.is_empty() && !name.contains('.') && is_var_name(name) {
            if let Some(value) = vars.get(name) {
                return value.clone();
            }
        }
        if let Some((head, path)) = name.split_once('.') {
            if is_var_name(head) && path.split('.').all(is_path_segment) {
                if let Some(value) = lookup_path(vars.get(head), path) {
                    return value.clone();
                }
            }
        }
    }

    // Interpolation: replace each reference with its display form.
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let tail = &rest[1..];
        let name_len = tail
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(tail.len());
        let reference = tail[..name_len].trim_end_matches('.');
        if reference.is_empty() {
            out.push('$');
            rest = &rest[1..];
            continue;
        }

        let (head, path) = match reference.split_once('.') {
            Some((h, p)) => (h, Some(p)),
            None => (reference, None),
        };
        let resolved = match path {
            None => vars.get(head),
            Some(p) => lookup_path(vars.get(head), p),
        };
        match resolved {
            Some(value) => {
                out.push_str(&display(value));
                rest = &rest[1 + reference.len()..];
            }
            None => {
                out.push('$');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_path_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn lookup_path<'v>(value: Option<&'v Value>, path: &str) -> Option<&'v Value> {
    let mut current = value?;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a conditional-step expression against a scope.
///
/// The expression language is deliberately small and side-effect free:
/// literals, `$var` references with `.field` access, `==`/`!=`, `not`,
/// `and`, `or`, and parentheses. Anything else evaluates by JSON
/// truthiness.
pub fn eval_condition(expr: &str, vars: &Scope) -> bool {
    let tokens = tokenize(expr);
    let mut parser = CondParser {
        tokens: &tokens,
        pos: 0,
        vars,
    };
    let value = parser.or_expr();
    truthy(&value)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LParen,
    RParen,
    Eq,
    Ne,
    Not,
    And,
    Or,
    Lit(Value),
    Ref(String),
}

fn tokenize(expr: &str) -> Vec<Tok> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Tok::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Tok::Ne);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                let s: String = chars[start..j].iter().collect();
                tokens.push(Tok::Lit(Value::String(s)));
                i = j + 1;
            }
            '$' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len()
                    && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.')
                {
                    j += 1;
                }
                tokens.push(Tok::Ref(chars[start..j].iter().collect()));
                i = j;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let text: String = chars[start..j].iter().collect();
                let lit = text
                    .parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| text.parse::<f64>().map(Value::from))
                    .unwrap_or(Value::String(text));
                tokens.push(Tok::Lit(lit));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[start..j].iter().collect();
                tokens.push(match word.as_str() {
                    "not" => Tok::Not,
                    "and" => Tok::And,
                    "or" => Tok::Or,
                    "true" | "True" => Tok::Lit(Value::Bool(true)),
                    "false" | "False" => Tok::Lit(Value::Bool(false)),
                    "null" | "None" => Tok::Lit(Value::Null),
                    _ => Tok::Lit(Value::String(word)),
                });
                i = j;
            }
            _ => i += 1,
        }
    }
    tokens
}

struct CondParser<'a> {
    tokens: &'a [Tok],
    pos: usize,
    vars: &'a Scope,
}

impl CondParser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr(&mut self) -> Value {
        let mut left = self.and_expr();
        while self.peek() == Some(&Tok::Or) {
            self.next();
            let right = self.and_expr();
            left = Value::Bool(truthy(&left) || truthy(&right));
        }
        left
    }

    fn and_expr(&mut self) -> Value {
        let mut left = self.not_expr();
        while self.peek() == Some(&Tok::And) {
            self.next();
            let right = self.not_expr();
            left = Value::Bool(truthy(&left) && truthy(&right));
        }
        left
    }

    fn not_expr(&mut self) -> Value {
        if self.peek() == Some(&Tok::Not) {
            self.next();
            let inner = self.not_expr();
            return Value::Bool(!truthy(&inner));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Value {
        let left = self.primary();
        match self.peek() {
            Some(Tok::Eq) => {
                self.next();
                let right = self.primary();
                Value::Bool(left == right)
            }
            Some(Tok::Ne) => {
                self.next();
                let right = self.primary();
                Value::Bool(left != right)
            }
            _ => left,
        }
    }

    fn primary(&mut self) -> Value {
        match self.next() {
            Some(Tok::LParen) => {
                let inner = self.or_expr();
                if self.peek() == Some(&Tok::RParen) {
                    self.next();
                }
                inner
            }
            Some(Tok::Lit(v)) => v,
            Some(Tok::Ref(path)) => {
                let (head, rest) = match path.split_once('.') {
                    Some((h, r)) => (h, Some(r)),
                    None => (path.as_str(), None),
                };
                let resolved = match rest {
                    None => self.vars.get(head),
                    Some(r) => lookup_path(self.vars.get(head), r),
                };
                resolved.cloned().unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }
}
