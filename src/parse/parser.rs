use crate::lang::Lang;
use crate::parse::errors::ParseError;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser wrapper bound to one language.
pub struct LangParser {
    parser: Parser,
    lang: Lang,
}

impl LangParser {
    pub fn new(lang: Lang) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&lang.ts_language())
            .map_err(|_| ParseError::LanguageSet)?;
        Ok(Self { parser, lang })
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParseError> {
        self.parser.parse(source, None).ok_or(ParseError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(&mut self, source: &'a str) -> Result<ParsedSource<'a>, ParseError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource {
            source,
            tree,
            lang: self.lang,
        })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
    pub lang: Lang,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// True iff the tree contains no ERROR or MISSING nodes.
    pub fn parses_ok(&self) -> bool {
        !has_error_nodes(self.tree.root_node())
    }

    pub fn has_errors(&self) -> bool {
        has_error_nodes(self.tree.root_node())
    }

    /// All ERROR/MISSING nodes in the tree, with surrounding context.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), self.source, &mut errors);
        errors
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}

/// Location of an ERROR node in the source.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
}

fn has_error_nodes(node: tree_sitter::Node<'_>) -> bool {
    if node.is_error() || node.is_missing() {
        return true;
    }
    // has_error() is a cheap subtree flag maintained by tree-sitter
    if !node.has_error() {
        return false;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if has_error_nodes(child) {
            return true;
        }
    }
    false
}

fn collect_error_nodes(node: tree_sitter::Node<'_>, source: &str, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        let start = node.start_position();
        let byte_start = node.start_byte();
        let byte_end = node.end_byte();

        let context_start = byte_start.saturating_sub(20);
        let context_end = (byte_end + 20).min(source.len());
        let context = source
            .get(context_start..context_end)
            .unwrap_or("")
            .replace('\n', "\\n");

        errors.push(ErrorNode {
            byte_start,
            byte_end,
            line: start.row + 1,
            column: start.column + 1,
            context,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, source, errors);
    }
}

/// Check whether `edited` introduces parse errors that were not present
/// in `original`. Pre-existing errors at the same byte positions are
/// tolerated.
pub fn new_errors_introduced(
    lang: Lang,
    original: &str,
    edited: &str,
) -> Result<Vec<ErrorNode>, ParseError> {
    let mut parser = LangParser::new(lang)?;
    let original_parsed = parser.parse_with_source(original)?;
    let original_positions: std::collections::HashSet<(usize, usize)> = original_parsed
        .error_nodes()
        .iter()
        .map(|e| (e.byte_start, e.byte_end))
        .collect();

    let edited_parsed = parser.parse_with_source(edited)?;
    let new_errors = edited_parsed
        .error_nodes()
        .into_iter()
        .filter(|e| !original_positions.contains(&(e.byte_start, e.byte_end)))
        .collect();

    Ok(new_errors)
}
