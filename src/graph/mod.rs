//! Structural summary of a set of source files: symbol definitions,
//! imports, and per-line construct labels.
//!
//! The graph is the input to referential and cross-file checks in the
//! plan verifier. It is rebuilt before every plan and immutable during
//! execution.

pub mod builder;

pub use builder::build_graph;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A symbol definition with its line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// Normalized: `class`, `type`, or `function`.
    pub kind: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One import row. `symbol` is `None` for whole-module imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub file: String,
    pub module: String,
    pub symbol: Option<String>,
    pub line: usize,
}

/// The full structural graph. Errors are reported as data, never raised:
/// a file that fails to parse contributes an error row and the walk
/// continues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    /// file -> line number (as a string, matching the wire format) -> label
    pub line_kinds: BTreeMap<String, BTreeMap<String, String>>,
    pub errors: Vec<String>,
}

impl Graph {
    /// Symbols defined in a given file.
    pub fn symbols_in<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |s| s.file == file)
    }

    /// Map from symbol name to the set of files importing it. Module
    /// imports attribute to the file whose stem matches the module tail.
    pub fn symbol_importers(&self) -> BTreeMap<String, Vec<String>> {
        let mut file_exports: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for sym in &self.symbols {
            file_exports.entry(&sym.file).or_default().push(&sym.name);
        }

        let mut importers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for imp in &self.imports {
            match imp.symbol.as_deref() {
                Some("*") | None => {
                    let module_stem = imp
                        .module
                        .rsplit(['.', '/'])
                        .next()
                        .unwrap_or(imp.module.as_str());
                    for (file, exports) in &file_exports {
                        let file_stem = std::path::Path::new(file)
                            .file_stem()
                            .and_then(|s| s.to_str())
                            .unwrap_or("");
                        if file_stem == module_stem {
                            for name in exports {
                                let entry = importers.entry((*name).to_string()).or_default();
                                if !entry.contains(&imp.file) {
                                    entry.push(imp.file.clone());
                                }
                            }
                        }
                    }
                }
                Some(symbol) => {
                    let entry = importers.entry(symbol.to_string()).or_default();
                    if !entry.contains(&imp.file) {
                        entry.push(imp.file.clone());
                    }
                }
            }
        }
        importers
    }
}
