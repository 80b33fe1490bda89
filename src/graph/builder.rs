//! Graph construction: parse each file, run the language's symbol and
//! import queries, and walk the tree for line-kind labels.

use crate::cache;
use crate::graph::{Graph, Import, Symbol};
use crate::lang::{queries, Lang};
use crate::pool;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use tree_sitter::{QueryCursor, StreamingIterator};
use walkdir::WalkDir;

/// Build a graph for the given paths. Directory arguments are expanded
/// recursively to supported source files. Empty input yields an empty
/// graph, not an error.
pub fn build_graph<P: AsRef<Path>>(paths: &[P]) -> Graph {
    let mut graph = Graph::default();

    for fp in expand_paths(paths) {
        let display = fp.display().to_string();

        let Some(lang) = Lang::from_path(&fp) else {
            graph.errors.push(format!("Unsupported file type: {display}"));
            continue;
        };

        let source = match std::fs::read_to_string(&fp) {
            Ok(s) => s,
            Err(e) => {
                graph.errors.push(format!("Cannot read {display}: {e}"));
                continue;
            }
        };

        if let Err(e) = build_file(&mut graph, lang, &display, &source) {
            graph.errors.push(format!("{display}: {e}"));
        }
    }

    debug!(
        symbols = graph.symbols.len(),
        imports = graph.imports.len(),
        errors = graph.errors.len(),
        "graph built"
    );
    graph
}

/// Build graph rows for a single in-memory source. Exposed for the plan
/// verifier, which re-reads files mid-verification.
pub fn build_file(
    graph: &mut Graph,
    lang: Lang,
    file: &str,
    source: &str,
) -> Result<(), crate::parse::ParseError> {
    let tree = pool::with_parser(lang, |p| p.parse(source))??;
    let root = tree.root_node();

    // Symbols
    let query = cache::get_or_compile_query(lang, queries::symbols(lang))?;
    let capture_names: Vec<&str> = query.capture_names().to_vec();
    let mut seen: HashSet<(String, usize)> = HashSet::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, source.as_bytes());
    while let Some(m) = matches.next() {
        let mut def_node = None;
        let mut outer = None;
        for capture in m.captures {
            let cap_name = capture_names[capture.index as usize];
            match cap_name {
                "def" => def_node = Some(capture.node),
                "func" => {} // predicate helper capture, not a definition
                _ => outer = Some((capture.node, cap_name)),
            }
        }
        let (Some(def), Some((node, tag))) = (def_node, outer) else {
            continue;
        };
        let name = source[def.byte_range()].to_string();
        let start_line = node.start_position().row + 1;
        if !seen.insert((name.clone(), start_line)) {
            continue; // same definition matched by two patterns
        }
        graph.symbols.push(Symbol {
            name,
            kind: queries::symbol_kind_for_tag(tag).to_string(),
            file: file.to_string(),
            start_line,
            end_line: node.end_position().row + 1,
        });
    }

    // Imports
    let query = cache::get_or_compile_query(lang, queries::imports(lang))?;
    let capture_names: Vec<&str> = query.capture_names().to_vec();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, source.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let cap_name = capture_names[capture.index as usize];
            if cap_name != "import" && cap_name != "require" {
                continue;
            }
            let text = &source[capture.node.byte_range()];
            let (module, symbol) = parse_import_text(lang, text);
            graph.imports.push(Import {
                file: file.to_string(),
                module,
                symbol,
                line: capture.node.start_position().row + 1,
            });
        }
    }

    // Line kinds
    let mut file_kinds = BTreeMap::new();
    collect_line_kinds(lang, root, &mut file_kinds);
    if !file_kinds.is_empty() {
        graph.line_kinds.insert(file.to_string(), file_kinds);
    }

    Ok(())
}

fn collect_line_kinds(
    lang: Lang,
    node: tree_sitter::Node<'_>,
    out: &mut BTreeMap<String, String>,
) {
    if let Some(label) = lang.line_kind(node.kind()) {
        out.insert((node.start_position().row + 1).to_string(), label.to_string());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_line_kinds(lang, child, out);
    }
}

fn expand_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in paths {
        let p = p.as_ref();
        if p.is_dir() {
            for entry in WalkDir::new(p).into_iter().flatten() {
                if entry.file_type().is_file() && Lang::from_path(entry.path()).is_some() {
                    out.push(entry.path().to_path_buf());
                }
            }
        } else {
            out.push(p.to_path_buf());
        }
    }
    out.sort();
    out
}

/// Split an import node's text into (module, imported symbol).
pub fn parse_import_text(lang: Lang, text: &str) -> (String, Option<String>) {
    static PY_FROM: OnceLock<Regex> = OnceLock::new();
    static PY_IMPORT: OnceLock<Regex> = OnceLock::new();
    static JS_MODULE: OnceLock<Regex> = OnceLock::new();
    static JAVA_IMPORT: OnceLock<Regex> = OnceLock::new();
    static GO_QUOTED: OnceLock<Regex> = OnceLock::new();
    static RUST_USE: OnceLock<Regex> = OnceLock::new();
    static RUBY_REQUIRE: OnceLock<Regex> = OnceLock::new();
    static PHP_USE: OnceLock<Regex> = OnceLock::new();
    static C_INCLUDE: OnceLock<Regex> = OnceLock::new();

    let text = text.trim();
    match lang {
        Lang::Python => {
            let from = PY_FROM.get_or_init(|| Regex::new(r"from\s+(\S+)\s+import\s+(.+)").unwrap());
            if let Some(c) = from.captures(text) {
                return (c[1].to_string(), Some(c[2].trim().to_string()));
            }
            let import = PY_IMPORT.get_or_init(|| Regex::new(r"import\s+(\S+)").unwrap());
            if let Some(c) = import.captures(text) {
                return (c[1].to_string(), None);
            }
            (text.to_string(), None)
        }
        Lang::JavaScript | Lang::TypeScript => {
            let re = JS_MODULE.get_or_init(|| {
                Regex::new(r#"(?:from\s+['"](.+?)['"]|require\s*\(\s*['"](.+?)['"]\s*\))"#).unwrap()
            });
            if let Some(c) = re.captures(text) {
                let module = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string());
                return (module.unwrap_or_else(|| text.to_string()), None);
            }
            (text.to_string(), None)
        }
        Lang::Java => {
            let re =
                JAVA_IMPORT.get_or_init(|| Regex::new(r"import\s+(?:static\s+)?(.+?)\s*;").unwrap());
            if let Some(c) = re.captures(text) {
                let path = c[1].to_string();
                return match path.rsplit_once('.') {
                    Some((module, symbol)) => (module.to_string(), Some(symbol.to_string())),
                    None => (path, None),
                };
            }
            (text.to_string(), None)
        }
        Lang::Go => {
            let re = GO_QUOTED.get_or_init(|| Regex::new(r#""(.+?)""#).unwrap());
            match re.captures(text) {
                Some(c) => (c[1].to_string(), None),
                None => (text.to_string(), None),
            }
        }
        Lang::Rust => {
            let re = RUST_USE.get_or_init(|| Regex::new(r"use\s+(.+?)\s*;").unwrap());
            if let Some(c) = re.captures(text) {
                let path = c[1].to_string();
                return match path.rsplit_once("::") {
                    Some((module, symbol)) => (module.to_string(), Some(symbol.to_string())),
                    None => (path, None),
                };
            }
            (text.to_string(), None)
        }
        Lang::Ruby => {
            let re = RUBY_REQUIRE.get_or_init(|| {
                Regex::new(r#"(?:require(?:_relative)?)\s+['"](.+?)['"]"#).unwrap()
            });
            match re.captures(text) {
                Some(c) => (c[1].to_string(), None),
                None => (text.to_string(), None),
            }
        }
        Lang::Php => {
            let re = PHP_USE.get_or_init(|| Regex::new(r"use\s+(.+?)\s*;").unwrap());
            if let Some(c) = re.captures(text) {
                let path = c[1].to_string();
                return match path.rsplit_once('\\') {
                    Some((module, symbol)) => (module.to_string(), Some(symbol.to_string())),
                    None => (path, None),
                };
            }
            (text.to_string(), None)
        }
        Lang::C | Lang::Cpp => {
            let re =
                C_INCLUDE.get_or_init(|| Regex::new(r#"#include\s*[<"](.+?)[>"]"#).unwrap());
            match re.captures(text) {
                Some(c) => (c[1].to_string(), None),
                None => (text.to_string(), None),
            }
        }
    }
}
