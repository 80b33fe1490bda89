//! Thread-local cache for compiled tree-sitter queries.
//!
//! Compiling a query is much more expensive than running it; locator
//! resolution and graph building reuse the same query strings over and
//! over within a plan. Only *compiled queries* are cached — resolution
//! results never are, so every resolution still runs against the live
//! tree. Capped at 256 entries; the cache is cleared when full.

use crate::lang::Lang;
use crate::parse::ParseError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tree_sitter::Query;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    static QUERY_CACHE: RefCell<HashMap<(Lang, String), Rc<Query>>> =
        RefCell::new(HashMap::with_capacity(64));
}

/// Get a compiled query from the cache, or compile and cache it.
pub fn get_or_compile_query(lang: Lang, query_str: &str) -> Result<Rc<Query>, ParseError> {
    QUERY_CACHE.with(|cell| {
        let mut cache = cell.borrow_mut();
        let key = (lang, query_str.to_string());
        if let Some(q) = cache.get(&key) {
            return Ok(Rc::clone(q));
        }

        let query = Query::new(&lang.ts_language(), query_str).map_err(|e| {
            ParseError::InvalidQuery {
                message: e.to_string(),
            }
        })?;
        let query = Rc::new(query);

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }
        cache.insert(key, Rc::clone(&query));
        Ok(query)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_compiled_queries() {
        let q1 = get_or_compile_query(Lang::Python, "(identifier) @id").unwrap();
        let q2 = get_or_compile_query(Lang::Python, "(identifier) @id").unwrap();
        assert!(Rc::ptr_eq(&q1, &q2));
    }

    #[test]
    fn same_query_different_language_is_distinct() {
        let py = get_or_compile_query(Lang::Python, "(identifier) @id").unwrap();
        let rs = get_or_compile_query(Lang::Rust, "(identifier) @id").unwrap();
        assert!(!Rc::ptr_eq(&py, &rs));
    }

    #[test]
    fn invalid_query_is_an_error() {
        let result = get_or_compile_query(Lang::Python, "(nonexistent_node_kind) @x");
        assert!(matches!(result, Err(ParseError::InvalidQuery { .. })));
    }
}
