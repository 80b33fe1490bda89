//! graphplan: structured source-code transformation engine.
//!
//! A formal three-tier operator system over tree-sitter concrete syntax
//! trees, paired with a layered pre- and post-condition verification
//! pipeline that catches structural, scope, and import errors before an
//! edit is committed to disk.
//!
//! # Architecture
//!
//! All mutation compiles down to byte-span splices composed in memory,
//! verified, and written atomically (tempfile + fsync + rename).
//! Intelligence lives in span acquisition — the locator layer resolves
//! declarative addresses against the *live* parse tree before every
//! use — not in application logic.
//!
//! - Tier 1 (`surgery`): move/copy/swap/rename/reorder/delete over
//!   existing subtrees; no code generation.
//! - Tier 2 (`template`): a closed catalog of fifteen parameterized
//!   templates with typed, validated slots.
//! - Tier 3 (`fragment`): typed AST fragments serialized to source with
//!   correct indentation.
//!
//! Post-edit checks (`verify::post`) run after every primitive: parse,
//! kind preservation, and containment block and roll back; referential,
//! import-closure, and triviality checks only warn. The plan verifier
//! (`verify::plan`) runs seven static layers before the first byte is
//! written.
//!
//! # Safety
//!
//! - Edited content is postcondition-checked in memory; nothing reaches
//!   disk until it passes, so a failed step leaves files bit-identical
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - Parse trees are rebuilt before and after every primitive, never
//!   cached across edits

pub mod cache;
pub mod dsl;
pub mod edit;
pub mod fragment;
pub mod graph;
pub mod lang;
pub mod legacy;
pub mod locate;
pub mod parse;
pub mod plan;
pub mod pool;
pub mod prim;
pub mod router;
pub mod safety;
pub mod surgery;
pub mod template;
pub mod verify;

// Re-exports
pub use dsl::{CustomOp, Scope};
pub use edit::{Edit, EditError, EditVerification, FileSnapshot};
pub use fragment::{execute_fragment, serialize_fragment, validate_fragment, Fragment};
pub use graph::{build_graph, Graph, Import, Symbol};
pub use lang::{Lang, NormKind};
pub use locate::{resolve, Locator, NodeSpan};
pub use parse::{LangParser, ParseError, ParsedSource};
pub use plan::{detect_tier, parse_plan, Tier};
pub use prim::{execute_primitive, execute_readonly, PrimOutcome, RunOptions};
pub use router::execute_step;
pub use safety::{SafetyError, WorkspaceGuard};
pub use template::{execute_template, validate_params, Template};
pub use verify::{run_postconditions, verify_plan, PlanReport, PostReport};
