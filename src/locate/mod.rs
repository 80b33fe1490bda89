pub mod locator;

pub use locator::{node_in_string_or_comment, node_name, resolve, resolve_nodes, Locator, NodeSpan};
