//! Thread-local parser pooling.
//!
//! Eliminates redundant parser creation by maintaining one reusable
//! parser per language per thread. Creates the parser on first use,
//! reuses it for subsequent operations.

use crate::lang::Lang;
use crate::parse::{LangParser, ParseError};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Lang, LangParser>> = RefCell::new(HashMap::new());
}

/// Execute a function with a pooled parser for the given language.
///
/// On first call per thread and language, creates a new parser;
/// subsequent calls reuse the same instance.
pub fn with_parser<F, R>(lang: Lang, f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut LangParser) -> R,
{
    PARSERS.with(|cell| {
        let mut map = cell.borrow_mut();
        if !map.contains_key(&lang) {
            map.insert(lang, LangParser::new(lang)?);
        }
        Ok(f(map.get_mut(&lang).expect("parser was just inserted above")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_parse_reuses_parser() {
        let ok = with_parser(Lang::Python, |p| {
            p.parse_with_source("x = 1\n").map(|t| t.parses_ok())
        })
        .unwrap()
        .unwrap();
        assert!(ok);

        // Second call on the same thread goes through the cached parser.
        let ok = with_parser(Lang::Python, |p| {
            p.parse_with_source("y = 2\n").map(|t| t.parses_ok())
        })
        .unwrap()
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn pool_handles_multiple_languages() {
        for (lang, src) in [
            (Lang::Python, "x = 1\n"),
            (Lang::Rust, "fn main() {}\n"),
            (Lang::Go, "package main\n"),
        ] {
            let ok = with_parser(lang, |p| p.parse_with_source(src).map(|t| t.parses_ok()))
                .unwrap()
                .unwrap();
            assert!(ok, "{} failed to parse", lang.name());
        }
    }
}
