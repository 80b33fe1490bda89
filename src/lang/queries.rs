//! Per-language tree-sitter query strings for symbol and import
//! extraction.
//!
//! Symbol queries capture the definition's name node as `@def` inside a
//! tagged capture for the whole definition (`@class_node`, `@func_node`,
//! ...). The tag is what the graph builder normalizes into a symbol
//! kind. Import queries capture whole import nodes as `@import` (or
//! `@require` for CommonJS).

use crate::lang::Lang;

/// Query string extracting symbol definitions for a language.
pub fn symbols(lang: Lang) -> &'static str {
    match lang {
        Lang::Python => {
            r#"
            (class_definition name: (identifier) @def) @class_node
            (function_definition name: (identifier) @def) @func_node
            "#
        }
        Lang::JavaScript => {
            r#"
            (class_declaration name: (identifier) @def) @class_node
            (function_declaration name: (identifier) @def) @func_node
            (method_definition name: (property_identifier) @def) @method_node
            (export_statement declaration: (function_declaration name: (identifier) @def)) @export_func
            (export_statement declaration: (class_declaration name: (identifier) @def)) @export_class
            "#
        }
        Lang::TypeScript => {
            r#"
            (class_declaration name: (type_identifier) @def) @class_node
            (function_declaration name: (identifier) @def) @func_node
            (method_definition name: (property_identifier) @def) @method_node
            (interface_declaration name: (type_identifier) @def) @iface_node
            (enum_declaration name: (identifier) @def) @enum_node
            (type_alias_declaration name: (type_identifier) @def) @type_node
            "#
        }
        Lang::Java => {
            r#"
            (class_declaration name: (identifier) @def) @class_node
            (method_declaration name: (identifier) @def) @method_node
            (interface_declaration name: (identifier) @def) @iface_node
            (enum_declaration name: (identifier) @def) @enum_node
            (constructor_declaration name: (identifier) @def) @ctor_node
            "#
        }
        Lang::Go => {
            r#"
            (function_declaration name: (identifier) @def) @func_node
            (method_declaration name: (field_identifier) @def) @method_node
            (type_declaration (type_spec name: (type_identifier) @def)) @type_node
            "#
        }
        Lang::Rust => {
            r#"
            (function_item name: (identifier) @def) @func_node
            (struct_item name: (type_identifier) @def) @struct_node
            (enum_item name: (type_identifier) @def) @enum_node
            (trait_item name: (type_identifier) @def) @trait_node
            "#
        }
        Lang::Ruby => {
            r#"
            (class name: (constant) @def) @class_node
            (method name: (identifier) @def) @method_node
            (module name: (constant) @def) @module_node
            (singleton_method name: (identifier) @def) @smethod_node
            "#
        }
        Lang::Php => {
            r#"
            (class_declaration name: (name) @def) @class_node
            (function_definition name: (name) @def) @func_node
            (method_declaration name: (name) @def) @method_node
            (interface_declaration name: (name) @def) @iface_node
            (trait_declaration name: (name) @def) @trait_node
            "#
        }
        Lang::C => {
            r#"
            (function_definition declarator: (function_declarator declarator: (identifier) @def)) @func_node
            (struct_specifier name: (type_identifier) @def) @struct_node
            (enum_specifier name: (type_identifier) @def) @enum_node
            (type_definition declarator: (type_identifier) @def) @typedef_node
            "#
        }
        Lang::Cpp => {
            r#"
            (function_definition declarator: (function_declarator declarator: (identifier) @def)) @func_node
            (function_definition declarator: (function_declarator declarator: (qualified_identifier) @def)) @qual_func_node
            (class_specifier name: (type_identifier) @def) @class_node
            (struct_specifier name: (type_identifier) @def) @struct_node
            (enum_specifier name: (type_identifier) @def) @enum_node
            (namespace_definition name: (_) @def) @ns_node
            "#
        }
    }
}

/// Query string extracting import/include nodes for a language.
pub fn imports(lang: Lang) -> &'static str {
    match lang {
        Lang::Python => {
            r#"
            (import_statement) @import
            (import_from_statement) @import
            "#
        }
        Lang::JavaScript => {
            r#"
            (import_statement) @import
            (call_expression function: (identifier) @func (#eq? @func "require")) @require
            "#
        }
        Lang::TypeScript => "(import_statement) @import",
        Lang::Java => "(import_declaration) @import",
        Lang::Go => "(import_declaration) @import",
        Lang::Rust => "(use_declaration) @import",
        Lang::Ruby => {
            r#"
            (call method: (identifier) @func (#match? @func "^(require|require_relative|include|extend)$")) @import
            "#
        }
        Lang::Php => "(namespace_use_declaration) @import",
        Lang::C | Lang::Cpp => "(preproc_include) @import",
    }
}

/// Normalize a symbol-query capture tag into a graph symbol kind.
pub fn symbol_kind_for_tag(tag: &str) -> &'static str {
    let tag = tag.to_ascii_lowercase();
    if tag.contains("class") || tag.contains("struct") || tag.contains("trait") || tag.contains("iface") {
        "class"
    } else if tag.contains("enum") || tag.contains("type") || tag.contains("ns") || tag.contains("module") {
        "type"
    } else {
        "function"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_normalization() {
        assert_eq!(symbol_kind_for_tag("class_node"), "class");
        assert_eq!(symbol_kind_for_tag("iface_node"), "class");
        assert_eq!(symbol_kind_for_tag("enum_node"), "type");
        assert_eq!(symbol_kind_for_tag("func_node"), "function");
        assert_eq!(symbol_kind_for_tag("ctor_node"), "function");
        assert_eq!(symbol_kind_for_tag("smethod_node"), "function");
    }

    #[test]
    fn queries_compile_for_every_language() {
        for lang in [
            Lang::Python,
            Lang::JavaScript,
            Lang::TypeScript,
            Lang::Java,
            Lang::Go,
            Lang::Rust,
            Lang::Ruby,
            Lang::Php,
            Lang::C,
            Lang::Cpp,
        ] {
            let grammar = lang.ts_language();
            tree_sitter::Query::new(&grammar, symbols(lang))
                .unwrap_or_else(|e| panic!("symbols query invalid for {}: {e}", lang.name()));
            tree_sitter::Query::new(&grammar, imports(lang))
                .unwrap_or_else(|e| panic!("imports query invalid for {}: {e}", lang.name()));
        }
    }
}
