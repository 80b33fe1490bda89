//! Locator resolution: a declarative address into a CST, resolved
//! against the live tree before every use.
//!
//! Two modes: a structured descriptor (normalized kind + name + nesting
//! constraints) and a raw tree-sitter s-expression query with a capture
//! name. Resolution never throws for "not found" — it returns an empty
//! list and lets the caller's precondition decide.

use crate::cache;
use crate::lang::{is_comment_kind, is_string_or_comment_kind, Lang, NormKind};
use crate::parse::{ParseError, ParsedSource};
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, QueryCursor, StreamingIterator};

/// A declarative address for CST nodes.
///
/// Wire shape (all fields optional except that either `kind` or a
/// `type: "sexp"` query must be present for the locator to match
/// anything):
///
/// ```json
/// {"kind": "function", "name": "f", "file": "m.py", "field": "body"}
/// {"type": "sexp", "query": "(identifier) @id", "capture": "id", "file": "m.py"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// `"sexp"` selects raw-query mode.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Locator>>,

    /// Named CST field of the matched node (`body`, `parameters`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Select the Nth substantive child of each match (-1 = last).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth_child: Option<i64>,

    /// Disambiguate multiple matches (-1 = last). Out of bounds resolves
    /// to nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,

    /// S-expression query (sexp mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Capture name to select from the query (sexp mode; default `id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
}

impl Locator {
    pub fn is_sexp(&self) -> bool {
        self.mode.as_deref() == Some("sexp")
    }

    /// A short human-readable rendering for error messages.
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "<locator>".to_string())
    }
}

/// A lifetime-free view of a resolved node. Callers that outlive the
/// parse (everything above the resolver) work with spans, never with
/// borrowed tree nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: String,
}

impl NodeSpan {
    pub fn of(node: Node<'_>) -> Self {
        NodeSpan {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            kind: node.kind().to_string(),
        }
    }
}

/// Resolve a locator against a parsed source, returning spans.
pub fn resolve(loc: &Locator, parsed: &ParsedSource<'_>) -> Result<Vec<NodeSpan>, ParseError> {
    Ok(resolve_nodes(loc, parsed)?.into_iter().map(NodeSpan::of).collect())
}

/// Resolve a locator to live tree nodes. The borrow ties results to the
/// parse; extract spans before editing.
pub fn resolve_nodes<'p>(
    loc: &Locator,
    parsed: &'p ParsedSource<'_>,
) -> Result<Vec<Node<'p>>, ParseError> {
    let lang: Lang = parsed.lang;
    let root = parsed.root_node();

    if loc.is_sexp() {
        let Some(query_str) = loc.query.as_deref().filter(|q| !q.is_empty()) else {
            return Ok(Vec::new());
        };
        let capture_name = loc.capture.as_deref().unwrap_or("id");
        let query = cache::get_or_compile_query(lang, query_str)?;
        let capture_names: Vec<&str> = query.capture_names().to_vec();

        let mut nodes = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, root, parsed.source.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                if capture_names[capture.index as usize] == capture_name {
                    nodes.push(capture.node);
                }
            }
        }
        return Ok(apply_index(nodes, loc.index));
    }

    // Structured mode
    let target_types: &[&str] = match NormKind::parse(&loc.kind) {
        Some(kind) => lang.native_kinds(kind),
        None => &[],
    };
    if target_types.is_empty() {
        return Ok(Vec::new());
    }

    let search_roots: Vec<Node<'p>> = match &loc.parent {
        Some(parent) => {
            let parents = resolve_nodes(parent, parsed)?;
            if parents.is_empty() {
                return Ok(Vec::new());
            }
            parents
        }
        None => vec![root],
    };

    let mut matches = Vec::new();
    for search_root in search_roots {
        collect_matching(
            search_root,
            target_types,
            loc.name.as_deref(),
            parsed.source,
            &mut matches,
        );
    }

    if let Some(field_name) = loc.field.as_deref() {
        matches = matches
            .into_iter()
            .filter_map(|n| n.child_by_field_name(field_name))
            .collect();
    }

    if let Some(nth) = loc.nth_child {
        matches = matches
            .into_iter()
            .filter_map(|n| nth_substantive_child(n, nth))
            .collect();
    }

    Ok(apply_index(matches, loc.index))
}

fn apply_index<'p>(nodes: Vec<Node<'p>>, index: Option<i64>) -> Vec<Node<'p>> {
    let Some(index) = index else { return nodes };
    let len = nodes.len() as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        return Vec::new();
    }
    vec![nodes[idx as usize]]
}

fn collect_matching<'p>(
    node: Node<'p>,
    target_types: &[&str],
    name: Option<&str>,
    source: &str,
    out: &mut Vec<Node<'p>>,
) {
    if target_types.contains(&node.kind()) {
        match name {
            Some(wanted) => {
                if node_name(node, source).as_deref() == Some(wanted) {
                    out.push(node);
                }
            }
            None => out.push(node),
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_matching(child, target_types, name, source, out);
    }
}

/// The name of a definition node. Falls back through the declarator
/// chain for C/C++ function definitions.
pub fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    let name_node = node.child_by_field_name("name").or_else(|| {
        let decl = node.child_by_field_name("declarator")?;
        Some(decl.child_by_field_name("declarator").unwrap_or(decl))
    })?;
    Some(source[name_node.byte_range()].to_string())
}

/// The Nth substantive child (-1 = last), skipping comments and pure
/// punctuation tokens.
fn nth_substantive_child(node: Node<'_>, nth: i64) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node
        .children(&mut cursor)
        .filter(|c| !is_comment_kind(c.kind()) && !matches!(c.kind(), "(" | ")" | "{" | "}" | ":" | ","))
        .collect();
    let len = children.len() as i64;
    let idx = if nth < 0 { len + nth } else { nth };
    if idx < 0 || idx >= len {
        return None;
    }
    Some(children[idx as usize])
}

/// True if any ancestor of the node (or the node itself) is a string or
/// comment construct.
pub fn node_in_string_or_comment(node: Node<'_>) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if is_string_or_comment_kind(n.kind()) {
            return true;
        }
        current = n.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::LangParser;

    fn parse(lang: Lang, source: &str) -> (LangParser, &str) {
        (LangParser::new(lang).unwrap(), source)
    }

    #[test]
    fn resolve_function_by_name() {
        let (mut parser, src) = parse(Lang::Python, "def f(x):\n    return x\n\ndef g(y):\n    return y\n");
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "function".into(),
            name: Some("g".into()),
            ..Default::default()
        };
        let spans = resolve(&loc, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, "function_definition");
        assert_eq!(spans[0].start_line, 4);
    }

    #[test]
    fn resolve_field_selects_body() {
        let (mut parser, src) = parse(Lang::Python, "def f(x):\n    return x + 1\n");
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "function".into(),
            name: Some("f".into()),
            field: Some("body".into()),
            ..Default::default()
        };
        let spans = resolve(&loc, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, "block");
    }

    #[test]
    fn resolve_with_parent_constraint() {
        let src = "class A:\n    def run(self):\n        pass\n\ndef run():\n    pass\n";
        let (mut parser, src) = parse(Lang::Python, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "function".into(),
            name: Some("run".into()),
            parent: Some(Box::new(Locator {
                kind: "class".into(),
                name: Some("A".into()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let spans = resolve(&loc, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_line, 2);
    }

    #[test]
    fn resolve_nth_child_negative() {
        let src = "def f():\n    a = 1\n    b = 2\n    return b\n";
        let (mut parser, src) = parse(Lang::Python, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "function".into(),
            name: Some("f".into()),
            field: Some("body".into()),
            nth_child: Some(-1),
            ..Default::default()
        };
        let spans = resolve(&loc, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, "return_statement");
    }

    #[test]
    fn resolve_index_disambiguates() {
        // Calls, not assignments: a Python assignment line matches both
        // `expression_statement` and its inner `assignment`.
        let src = "setup()\nrun()\nteardown()\n";
        let (mut parser, src) = parse(Lang::Python, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let base = Locator {
            kind: "statement".into(),
            ..Default::default()
        };
        let all = resolve(&base, &parsed).unwrap();
        assert_eq!(all.len(), 3);

        let second = Locator {
            index: Some(1),
            ..base.clone()
        };
        let spans = resolve(&second, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_line, 2);

        let out_of_bounds = Locator {
            index: Some(10),
            ..base
        };
        assert!(resolve(&out_of_bounds, &parsed).unwrap().is_empty());
    }

    #[test]
    fn resolve_sexp_query() {
        let src = "x = \"x\"\ny = x + 1\n";
        let (mut parser, src) = parse(Lang::Python, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            mode: Some("sexp".into()),
            query: Some("(identifier) @id (#eq? @id \"x\")".into()),
            capture: Some("id".into()),
            ..Default::default()
        };
        let nodes = resolve_nodes(&loc, &parsed).unwrap();
        // `x` as assignment target and as reference; the string "x" is
        // not an identifier node.
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn unknown_kind_resolves_empty() {
        let (mut parser, src) = parse(Lang::Python, "x = 1\n");
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "frobnicator".into(),
            ..Default::default()
        };
        assert!(resolve(&loc, &parsed).unwrap().is_empty());
    }

    #[test]
    fn string_comment_ancestry() {
        let src = "x = \"hello\"  # note\n";
        let (mut parser, src) = parse(Lang::Python, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let root = parsed.root_node();
        let string_node = root
            .descendant_for_byte_range(5, 6)
            .expect("descendant in string");
        assert!(node_in_string_or_comment(string_node));
        let x_node = root.descendant_for_byte_range(0, 1).unwrap();
        assert!(!node_in_string_or_comment(x_node));
    }

    #[test]
    fn rust_function_resolution() {
        let src = "fn alpha() {}\nfn beta() { alpha(); }\n";
        let (mut parser, src) = parse(Lang::Rust, src);
        let parsed = parser.parse_with_source(src).unwrap();
        let loc = Locator {
            kind: "function".into(),
            name: Some("beta".into()),
            ..Default::default()
        };
        let spans = resolve(&loc, &parsed).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, "function_item");
    }
}
