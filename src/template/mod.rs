//! Parameterized transform templates (Tier 2).
//!
//! A closed catalog of fifteen templates. The caller fills typed
//! parameter slots; the engine validates every slot, constructs the
//! code, and applies it through byte-level primitives. Handlers never
//! write bytes directly.

pub mod handlers;
pub mod validate;

pub use handlers::execute_template;
pub use validate::validate_params;

/// The type of a template parameter slot, which determines its
/// validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A valid identifier for the target language, not a keyword.
    Identifier,
    /// Parses as an expression (wrapped in a synthetic assignment).
    Expression,
    /// Parses as a statement.
    Statement,
    /// A type annotation string (shape-checked only).
    TypeAnnotation,
    /// A well-formed locator object.
    Locator,
    /// A valid Tier-3 fragment.
    Fragment,
    /// A list of identifiers.
    IdentifierList,
    /// One of a fixed set of values.
    Enum(&'static [&'static str]),
}

/// One typed parameter slot.
#[derive(Debug, Clone, Copy)]
pub struct TemplateParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

const fn req(name: &'static str, kind: ParamKind) -> TemplateParam {
    TemplateParam {
        name,
        kind,
        required: true,
        default: None,
    }
}

const fn opt(name: &'static str, kind: ParamKind) -> TemplateParam {
    TemplateParam {
        name,
        kind,
        required: false,
        default: None,
    }
}

const fn def(name: &'static str, kind: ParamKind, default: &'static str) -> TemplateParam {
    TemplateParam {
        name,
        kind,
        required: false,
        default: Some(default),
    }
}

/// A catalog entry: name, typed slots, and the AST kinds it consumes
/// and produces.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub params: &'static [TemplateParam],
    pub input_kind: &'static str,
    pub output_kind: &'static str,
}

/// The full template catalog.
pub static CATALOG: &[Template] = &[
    // Adding code
    Template {
        name: "guard_clause",
        params: &[
            req("condition", ParamKind::Expression),
            req("guard_body", ParamKind::Statement),
            req("target", ParamKind::Locator),
        ],
        input_kind: "block",
        output_kind: "block",
    },
    Template {
        name: "add_import_and_use",
        params: &[
            req("module", ParamKind::Expression),
            req("symbol", ParamKind::Identifier),
            req("usage_target", ParamKind::Locator),
            req("usage_expression", ParamKind::Expression),
        ],
        input_kind: "expression",
        output_kind: "expression",
    },
    Template {
        name: "add_method",
        params: &[
            req("class_locator", ParamKind::Locator),
            req("method_name", ParamKind::Identifier),
            def("parameters", ParamKind::IdentifierList, "self"),
            req("body", ParamKind::Statement),
            opt("decorator", ParamKind::Expression),
        ],
        input_kind: "class_definition",
        output_kind: "class_definition",
    },
    Template {
        name: "add_parameter",
        params: &[
            req("function", ParamKind::Locator),
            req("param_name", ParamKind::Identifier),
            opt("default_value", ParamKind::Expression),
            opt("type_annotation", ParamKind::TypeAnnotation),
            def("position", ParamKind::Enum(&["start", "end"]), "end"),
        ],
        input_kind: "function_definition",
        output_kind: "function_definition",
    },
    Template {
        name: "add_class_attribute",
        params: &[
            req("class_locator", ParamKind::Locator),
            req("attr_name", ParamKind::Identifier),
            req("attr_value", ParamKind::Expression),
            opt("type_annotation", ParamKind::TypeAnnotation),
        ],
        input_kind: "class_definition",
        output_kind: "class_definition",
    },
    Template {
        name: "add_decorator",
        params: &[
            req("target", ParamKind::Locator),
            req("decorator", ParamKind::Expression),
        ],
        input_kind: "definition",
        output_kind: "definition",
    },
    Template {
        name: "add_conditional_branch",
        params: &[
            req("if_target", ParamKind::Locator),
            req("branch_type", ParamKind::Enum(&["elif", "else"])),
            opt("condition", ParamKind::Expression),
            req("branch_body", ParamKind::Statement),
        ],
        input_kind: "if_statement",
        output_kind: "if_statement",
    },
    // Modifying code
    Template {
        name: "replace_expression",
        params: &[
            req("target", ParamKind::Locator),
            req("new_expression", ParamKind::Expression),
        ],
        input_kind: "expression",
        output_kind: "expression",
    },
    Template {
        name: "modify_condition",
        params: &[
            req("target", ParamKind::Locator),
            req("new_condition", ParamKind::Expression),
        ],
        input_kind: "compound_statement",
        output_kind: "compound_statement",
    },
    Template {
        name: "change_return_value",
        params: &[
            req("target", ParamKind::Locator),
            req("new_value", ParamKind::Expression),
        ],
        input_kind: "return_statement",
        output_kind: "return_statement",
    },
    Template {
        name: "replace_function_body",
        params: &[
            req("function", ParamKind::Locator),
            req("new_body", ParamKind::Fragment),
        ],
        input_kind: "function_definition",
        output_kind: "function_definition",
    },
    // Wrapping code
    Template {
        name: "wrap_try_except",
        params: &[
            req("target", ParamKind::Locator),
            def("exception_type", ParamKind::Expression, "Exception"),
            def("handler_body", ParamKind::Statement, "pass"),
            opt("exception_var", ParamKind::Identifier),
        ],
        input_kind: "statement",
        output_kind: "statement",
    },
    Template {
        name: "wrap_context_manager",
        params: &[
            req("target", ParamKind::Locator),
            req("context_expr", ParamKind::Expression),
            opt("as_var", ParamKind::Identifier),
        ],
        input_kind: "statement",
        output_kind: "statement",
    },
    // Restructuring
    Template {
        name: "extract_variable",
        params: &[
            req("target", ParamKind::Locator),
            req("variable_name", ParamKind::Identifier),
        ],
        input_kind: "expression",
        output_kind: "expression",
    },
    Template {
        name: "inline_variable",
        params: &[
            req("target", ParamKind::Locator),
            req("variable_name", ParamKind::Identifier),
        ],
        input_kind: "block",
        output_kind: "block",
    },
];

pub fn lookup(name: &str) -> Option<&'static Template> {
    CATALOG.iter().find(|t| t.name == name)
}

pub fn is_template(name: &str) -> bool {
    lookup(name).is_some()
}
