//! Analysis Layer
//!
//! Searches recognized console text for automation triggers.

pub mod search;

pub use search::{
    find_literal, find_literal_in_lines, find_regex, find_regex_in_lines, search, SearchConfig,
    SearchMatch, SearchMode, SearchResults,
};
