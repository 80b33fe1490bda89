//! Language registry: file-extension detection, normalized AST kind
//! tables, and per-language metadata used by every layer above.
//!
//! Higher layers speak in *normalized* kinds (`function`, `class`,
//! `method`, `import`, `statement`, `interface`, `enum`) and never in
//! language-native node types; this module owns the translation.

pub mod queries;

use ast_grep_language::{LanguageExt, SupportLang};
use std::path::Path;

/// A supported language, identified by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Ruby,
    Php,
    C,
    Cpp,
}

impl Lang {
    /// Detect language from a file path's extension. Returns `None` for
    /// unsupported file types.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Lang::Python),
            "js" | "jsx" => Some(Lang::JavaScript),
            "ts" | "tsx" => Some(Lang::TypeScript),
            "java" => Some(Lang::Java),
            "go" => Some(Lang::Go),
            "rs" => Some(Lang::Rust),
            "rb" => Some(Lang::Ruby),
            "php" => Some(Lang::Php),
            "c" | "h" => Some(Lang::C),
            "cpp" | "cxx" | "cc" | "hpp" | "hxx" => Some(Lang::Cpp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Lang::Python => "python",
            Lang::JavaScript => "javascript",
            Lang::TypeScript => "typescript",
            Lang::Java => "java",
            Lang::Go => "go",
            Lang::Rust => "rust",
            Lang::Ruby => "ruby",
            Lang::Php => "php",
            Lang::C => "c",
            Lang::Cpp => "cpp",
        }
    }

    fn support_lang(&self) -> SupportLang {
        match self {
            Lang::Python => SupportLang::Python,
            Lang::JavaScript => SupportLang::JavaScript,
            Lang::TypeScript => SupportLang::TypeScript,
            Lang::Java => SupportLang::Java,
            Lang::Go => SupportLang::Go,
            Lang::Rust => SupportLang::Rust,
            Lang::Ruby => SupportLang::Ruby,
            Lang::Php => SupportLang::Php,
            Lang::C => SupportLang::C,
            Lang::Cpp => SupportLang::Cpp,
        }
    }

    /// Get the tree-sitter grammar for this language.
    pub fn ts_language(&self) -> tree_sitter::Language {
        self.support_lang().get_ts_language()
    }

    /// Whether the language delimits blocks by indentation rather than
    /// braces. Drives code construction in templates and fragments.
    pub fn uses_indentation(&self) -> bool {
        matches!(self, Lang::Python)
    }

    /// Native node types for a normalized kind in this language. An
    /// empty slice means the kind has no counterpart here.
    pub fn native_kinds(&self, kind: NormKind) -> &'static [&'static str] {
        use Lang::*;
        use NormKind::*;
        match (kind, self) {
            (Function, Python) => &["function_definition"],
            (Function, JavaScript) => &["function_declaration", "method_definition"],
            (Function, TypeScript) => &["function_declaration", "method_definition"],
            (Function, Java) => &["method_declaration", "constructor_declaration"],
            (Function, Go) => &["function_declaration", "method_declaration"],
            (Function, Rust) => &["function_item"],
            (Function, Ruby) => &["method", "singleton_method"],
            (Function, Php) => &["function_definition", "method_declaration"],
            (Function, C) => &["function_definition"],
            (Function, Cpp) => &["function_definition"],

            (Class, Python) => &["class_definition"],
            (Class, JavaScript) => &["class_declaration"],
            (Class, TypeScript) => &["class_declaration"],
            (Class, Java) => &["class_declaration"],
            (Class, Go) => &[],
            (Class, Rust) => &["struct_item"],
            (Class, Ruby) => &["class"],
            (Class, Php) => &["class_declaration"],
            (Class, C) => &["struct_specifier"],
            (Class, Cpp) => &["class_specifier", "struct_specifier"],

            // Methods are function definitions nested inside a class or
            // impl body; the resolver narrows by parent when asked to.
            (Method, Python) => &["function_definition"],
            (Method, JavaScript) => &["method_definition"],
            (Method, TypeScript) => &["method_definition"],
            (Method, Java) => &["method_declaration"],
            (Method, Go) => &["method_declaration"],
            (Method, Rust) => &["function_item"],
            (Method, Ruby) => &["method"],
            (Method, Php) => &["method_declaration"],
            (Method, C) => &[],
            (Method, Cpp) => &[],

            (Import, Python) => &["import_statement", "import_from_statement"],
            (Import, JavaScript) => &["import_statement"],
            (Import, TypeScript) => &["import_statement"],
            (Import, Java) => &["import_declaration"],
            (Import, Go) => &["import_declaration"],
            (Import, Rust) => &["use_declaration"],
            (Import, Ruby) => &["call"],
            (Import, Php) => &["namespace_use_declaration"],
            (Import, C) => &["preproc_include"],
            (Import, Cpp) => &["preproc_include"],

            (Statement, Python) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
                "raise_statement",
                "assert_statement",
                "with_statement",
                "assignment",
            ],
            (Statement, JavaScript) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
                "throw_statement",
                "variable_declaration",
                "lexical_declaration",
            ],
            (Statement, TypeScript) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
                "throw_statement",
                "variable_declaration",
                "lexical_declaration",
            ],
            (Statement, Java) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
                "throw_statement",
                "local_variable_declaration",
            ],
            (Statement, Go) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "short_var_declaration",
            ],
            (Statement, Rust) => &[
                "expression_statement",
                "return_expression",
                "if_expression",
                "for_expression",
                "while_expression",
                "let_declaration",
            ],
            (Statement, Ruby) => &["expression_statement", "return", "if", "for", "while"],
            (Statement, Php) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
            ],
            (Statement, C) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "declaration",
            ],
            (Statement, Cpp) => &[
                "expression_statement",
                "return_statement",
                "if_statement",
                "for_statement",
                "while_statement",
                "declaration",
                "try_statement",
            ],

            (Interface, TypeScript) => &["interface_declaration"],
            (Interface, Java) => &["interface_declaration"],
            (Interface, Rust) => &["trait_item"],
            (Interface, Php) => &["interface_declaration"],
            (Interface, _) => &[],

            (Enum, TypeScript) => &["enum_declaration"],
            (Enum, Java) => &["enum_declaration"],
            (Enum, Rust) => &["enum_item"],
            (Enum, C) => &["enum_specifier"],
            (Enum, Cpp) => &["enum_specifier"],
            (Enum, _) => &[],
        }
    }

    /// Map a native node type to a line-kind label, if the node starts a
    /// labeled construct.
    pub fn line_kind(&self, native: &str) -> Option<&'static str> {
        use Lang::*;
        let label = match (self, native) {
            (Python, "if_statement")
            | (JavaScript, "if_statement")
            | (TypeScript, "if_statement")
            | (Java, "if_statement")
            | (Go, "if_statement")
            | (Rust, "if_expression")
            | (Ruby, "if")
            | (Php, "if_statement")
            | (C, "if_statement")
            | (Cpp, "if_statement") => "if_statement",

            (Python, "for_statement")
            | (JavaScript, "for_statement")
            | (JavaScript, "for_in_statement")
            | (TypeScript, "for_statement")
            | (TypeScript, "for_in_statement")
            | (Java, "for_statement")
            | (Java, "enhanced_for_statement")
            | (Go, "for_statement")
            | (Rust, "for_expression")
            | (Ruby, "for")
            | (Php, "for_statement")
            | (Php, "foreach_statement")
            | (C, "for_statement")
            | (Cpp, "for_statement")
            | (Cpp, "for_range_loop") => "for_statement",

            (Python, "while_statement")
            | (JavaScript, "while_statement")
            | (TypeScript, "while_statement")
            | (Java, "while_statement")
            | (Rust, "while_expression")
            | (Ruby, "while")
            | (Php, "while_statement")
            | (C, "while_statement")
            | (Cpp, "while_statement") => "while_statement",

            (Python, "return_statement")
            | (JavaScript, "return_statement")
            | (TypeScript, "return_statement")
            | (Java, "return_statement")
            | (Go, "return_statement")
            | (Rust, "return_expression")
            | (Ruby, "return")
            | (Php, "return_statement")
            | (C, "return_statement")
            | (Cpp, "return_statement") => "return_statement",

            (Python, "raise_statement")
            | (JavaScript, "throw_statement")
            | (TypeScript, "throw_statement")
            | (Java, "throw_statement")
            | (Php, "throw_expression")
            | (Cpp, "throw_statement") => "raise_statement",

            (Python, "try_statement")
            | (JavaScript, "try_statement")
            | (TypeScript, "try_statement")
            | (Java, "try_statement")
            | (Ruby, "begin")
            | (Php, "try_statement")
            | (Cpp, "try_statement") => "try_statement",

            _ => return None,
        };
        Some(label)
    }

    /// Language keywords that may not be used as identifiers. Used by
    /// template parameter validation; deliberately conservative.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Lang::Python => &[
                "False", "None", "True", "and", "as", "assert", "async", "await", "break",
                "class", "continue", "def", "del", "elif", "else", "except", "finally", "for",
                "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or",
                "pass", "raise", "return", "try", "while", "with", "yield",
            ],
            Lang::JavaScript | Lang::TypeScript => &[
                "break", "case", "catch", "class", "const", "continue", "debugger", "default",
                "delete", "do", "else", "export", "extends", "finally", "for", "function", "if",
                "import", "in", "instanceof", "let", "new", "return", "super", "switch", "this",
                "throw", "try", "typeof", "var", "void", "while", "with", "yield",
            ],
            Lang::Java => &[
                "abstract", "boolean", "break", "byte", "case", "catch", "char", "class",
                "continue", "default", "do", "double", "else", "enum", "extends", "final",
                "finally", "float", "for", "if", "implements", "import", "int", "interface",
                "long", "new", "package", "private", "protected", "public", "return", "short",
                "static", "super", "switch", "this", "throw", "throws", "try", "void", "while",
            ],
            Lang::Go => &[
                "break", "case", "chan", "const", "continue", "default", "defer", "else",
                "fallthrough", "for", "func", "go", "goto", "if", "import", "interface", "map",
                "package", "range", "return", "select", "struct", "switch", "type", "var",
            ],
            Lang::Rust => &[
                "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
                "enum", "extern", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
                "move", "mut", "pub", "ref", "return", "self", "static", "struct", "super",
                "trait", "type", "unsafe", "use", "where", "while",
            ],
            Lang::Ruby => &[
                "alias", "begin", "break", "case", "class", "def", "do", "else", "elsif", "end",
                "ensure", "false", "for", "if", "in", "module", "next", "nil", "not", "redo",
                "rescue", "retry", "return", "self", "super", "then", "true", "unless", "until",
                "when", "while", "yield",
            ],
            Lang::Php => &[
                "abstract", "break", "case", "catch", "class", "const", "continue", "default",
                "do", "echo", "else", "elseif", "extends", "final", "finally", "for", "foreach",
                "function", "if", "implements", "interface", "namespace", "new", "private",
                "protected", "public", "return", "static", "switch", "throw", "trait", "try",
                "use", "while",
            ],
            Lang::C | Lang::Cpp => &[
                "auto", "break", "case", "char", "class", "const", "continue", "default", "do",
                "double", "else", "enum", "extern", "float", "for", "goto", "if", "int", "long",
                "namespace", "new", "return", "short", "signed", "sizeof", "static", "struct",
                "switch", "template", "typedef", "union", "unsigned", "using", "void", "while",
            ],
        }
    }

    /// Built-in identifiers assumed to be always in scope. Feeds the
    /// referential-integrity check; intentionally incomplete for
    /// languages where "builtin" is not a meaningful category.
    pub fn builtins(&self) -> &'static [&'static str] {
        match self {
            Lang::Python => &[
                "abs", "all", "any", "bool", "bytes", "callable", "chr", "classmethod", "dict",
                "dir", "enumerate", "filter", "float", "format", "frozenset", "getattr",
                "hasattr", "hash", "id", "int", "isinstance", "issubclass", "iter", "len",
                "list", "map", "max", "min", "next", "object", "open", "ord", "print",
                "property", "range", "repr", "reversed", "round", "set", "setattr", "sorted",
                "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
                "Exception", "ValueError", "TypeError", "KeyError", "IndexError",
                "AttributeError", "RuntimeError", "StopIteration", "NotImplementedError",
                "OSError", "IOError", "None", "True", "False", "self", "cls", "__name__",
                "__file__",
            ],
            Lang::JavaScript | Lang::TypeScript => &[
                "Array", "Boolean", "Date", "Error", "JSON", "Map", "Math", "Number", "Object",
                "Promise", "RegExp", "Set", "String", "Symbol", "TypeError", "console",
                "decodeURIComponent", "encodeURIComponent", "globalThis", "isNaN", "parseFloat",
                "parseInt", "undefined", "null", "this", "arguments", "require", "module",
                "exports", "window", "document",
            ],
            Lang::Ruby => &[
                "puts", "print", "p", "require", "require_relative", "raise", "lambda", "proc",
                "attr_accessor", "attr_reader", "attr_writer", "nil", "self", "true", "false",
            ],
            Lang::Php => &[
                "array", "count", "echo", "isset", "unset", "empty", "strlen", "sprintf",
                "in_array", "array_map", "array_filter", "is_null", "is_string", "is_array",
                "null", "true", "false", "this",
            ],
            // Compiled languages resolve names at build time; the
            // referential check stays heuristic there.
            Lang::Java | Lang::Go | Lang::Rust | Lang::C | Lang::Cpp => &[],
        }
    }
}

/// Normalized AST kinds shared across languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormKind {
    Function,
    Class,
    Method,
    Import,
    Statement,
    Interface,
    Enum,
}

impl NormKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(NormKind::Function),
            "class" => Some(NormKind::Class),
            "method" => Some(NormKind::Method),
            "import" => Some(NormKind::Import),
            "statement" => Some(NormKind::Statement),
            "interface" => Some(NormKind::Interface),
            "enum" => Some(NormKind::Enum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NormKind::Function => "function",
            NormKind::Class => "class",
            NormKind::Method => "method",
            NormKind::Import => "import",
            NormKind::Statement => "statement",
            NormKind::Interface => "interface",
            NormKind::Enum => "enum",
        }
    }
}

/// Native node types that represent string literals or comments in any
/// supported grammar. Used by ancestor filters and occurrence
/// classification.
pub fn is_string_or_comment_kind(kind: &str) -> bool {
    matches!(
        kind,
        "string"
            | "comment"
            | "string_literal"
            | "template_string"
            | "line_comment"
            | "block_comment"
            | "string_content"
            | "interpreted_string_literal"
            | "raw_string_literal"
            | "string_fragment"
            | "heredoc_body"
            | "regex"
    )
}

pub fn is_string_kind(kind: &str) -> bool {
    matches!(
        kind,
        "string"
            | "string_literal"
            | "template_string"
            | "interpreted_string_literal"
            | "raw_string_literal"
            | "string_content"
            | "string_fragment"
            | "heredoc_body"
    )
}

pub fn is_comment_kind(kind: &str) -> bool {
    matches!(kind, "comment" | "line_comment" | "block_comment")
}
