//! Trigger search over recognized text
//!
//! Lines are always scanned from last to first, since the newest console
//! output sits at the bottom of the screen. Positions are reported in
//! character columns, matching the cell grid.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

use crate::error::{OcrError, Result, EXIT_MATCH, EXIT_NO_MATCH};
use crate::vision::recognizer::OcrResult;

/// Search options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Compare case-insensitively; matches still report original text
    pub ignore_case: bool,
    /// Stop at the first (bottom-most) match
    pub first_only: bool,
    /// Suppress textual output
    pub quiet: bool,
    /// Include line and column detail in formatted output
    pub line_numbers: bool,
}

/// How a query is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Literal,
    Regex,
}

/// One occurrence of the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// 0-based line index
    pub line: usize,
    /// 0-based start column
    pub start: usize,
    /// 0-based end column, exclusive
    pub end: usize,
    /// Matched text in its original case
    pub text: String,
    /// Regex capture groups 1..n; `None` for groups that did not participate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Option<String>>,
}

/// Findings of one search call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query or pattern searched for
    pub query: String,
    /// Matches, bottom line first, left to right within a line
    pub matches: Vec<SearchMatch>,
    /// Lines examined before the scan ended
    pub lines_scanned: usize,
    /// Whether anything matched
    pub found: bool,
}

impl SearchResults {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            matches: Vec::new(),
            lines_scanned: 0,
            found: false,
        }
    }

    /// Exit code for command-line callers: 0 found, 1 not found
    pub fn exit_code(&self) -> i32 {
        if self.found {
            EXIT_MATCH
        } else {
            EXIT_NO_MATCH
        }
    }

    /// Render matches as text; empty when `quiet`
    ///
    /// Plain mode prints each matched substring. With `line_numbers` each
    /// line reads `line:start-end: text`, followed by capture groups.
    pub fn format(&self, config: &SearchConfig) -> String {
        let mut out = String::new();
        if config.quiet {
            return out;
        }

        for m in &self.matches {
            if config.line_numbers {
                let _ = writeln!(out, "{}:{}-{}: {}", m.line, m.start, m.end, m.text);
                for (i, group) in m.groups.iter().enumerate() {
                    let _ = writeln!(out, "  ${} = {}", i + 1, group.as_deref().unwrap_or(""));
                }
            } else {
                let _ = writeln!(out, "{}", m.text);
            }
        }
        out
    }
}

/// Search recognized text for a literal or a pattern
pub fn search(
    result: &OcrResult,
    query: &str,
    mode: SearchMode,
    config: &SearchConfig,
) -> Result<SearchResults> {
    match mode {
        SearchMode::Literal => Ok(find_literal(result, query, config)),
        SearchMode::Regex => find_regex(result, query, config),
    }
}

/// Find every non-overlapping occurrence of `query` in recognized text
pub fn find_literal(result: &OcrResult, query: &str, config: &SearchConfig) -> SearchResults {
    find_literal_in_lines(&result.text, query, config)
}

/// Find every match of `pattern` in recognized text
///
/// Fails with `InvalidRegex` before scanning if the pattern does not compile.
pub fn find_regex(result: &OcrResult, pattern: &str, config: &SearchConfig) -> Result<SearchResults> {
    find_regex_in_lines(&result.text, pattern, config)
}

/// Literal search over arbitrary lines
///
/// An empty query matches nothing.
pub fn find_literal_in_lines<S: AsRef<str>>(
    lines: &[S],
    query: &str,
    config: &SearchConfig,
) -> SearchResults {
    let mut results = SearchResults::new(query);
    if query.is_empty() {
        return results;
    }

    let needle = if config.ignore_case {
        Normalized::new(query).text
    } else {
        query.to_string()
    };

    scan_bottom_up(lines, config, &mut results, |index, line| {
        let chars: Vec<char> = line.chars().collect();
        if config.ignore_case {
            let haystack = Normalized::new(line);
            haystack
                .text
                .match_indices(&needle)
                .map(|(at, found)| {
                    let (start, end) = haystack.columns(at, at + found.len());
                    make_match(index, &chars, start, end, Vec::new())
                })
                .collect()
        } else {
            let columns = ByteColumns::new(line);
            line.match_indices(&needle)
                .map(|(at, found)| {
                    let (start, end) = (columns.at(at), columns.at(at + found.len()));
                    make_match(index, &chars, start, end, Vec::new())
                })
                .collect()
        }
    });

    results
}

/// Regex search over arbitrary lines
pub fn find_regex_in_lines<S: AsRef<str>>(
    lines: &[S],
    pattern: &str,
    config: &SearchConfig,
) -> Result<SearchResults> {
    let regex = compile(pattern, config.ignore_case)?;
    let mut results = SearchResults::new(pattern);

    scan_bottom_up(lines, config, &mut results, |index, line| {
        let chars: Vec<char> = line.chars().collect();
        let columns = ByteColumns::new(line);
        regex
            .captures_iter(line)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect();
                Some(make_match(
                    index,
                    &chars,
                    columns.at(whole.start()),
                    columns.at(whole.end()),
                    groups,
                ))
            })
            .collect()
    });

    Ok(results)
}

fn compile(pattern: &str, ignore_case: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| OcrError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Visit lines last to first, collecting matches until done
fn scan_bottom_up<S, F>(lines: &[S], config: &SearchConfig, results: &mut SearchResults, mut find: F)
where
    S: AsRef<str>,
    F: FnMut(usize, &str) -> Vec<SearchMatch>,
{
    for (index, line) in lines.iter().enumerate().rev() {
        results.lines_scanned += 1;
        let mut found = find(index, line.as_ref());
        if found.is_empty() {
            continue;
        }

        if config.first_only {
            found.truncate(1);
            results.matches.extend(found);
            break;
        }
        results.matches.extend(found);
    }

    results.found = !results.matches.is_empty();
    debug!(
        "Search for {:?}: {} matches in {} lines",
        results.query,
        results.matches.len(),
        results.lines_scanned
    );
}

fn make_match(
    line: usize,
    chars: &[char],
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
) -> SearchMatch {
    SearchMatch {
        line,
        start,
        end,
        text: chars[start..end].iter().collect(),
        groups,
    }
}

/// Byte offset to character column lookup for one line
struct ByteColumns {
    /// Column of each byte offset, plus one entry for the end
    columns: Vec<usize>,
}

impl ByteColumns {
    fn new(line: &str) -> Self {
        let mut columns = Vec::with_capacity(line.len() + 1);
        for (column, ch) in line.chars().enumerate() {
            columns.extend(std::iter::repeat(column).take(ch.len_utf8()));
        }
        columns.push(line.chars().count());
        Self { columns }
    }

    fn at(&self, byte: usize) -> usize {
        self.columns[byte]
    }
}

/// Lowercased line with a map back to original character columns
///
/// Lowercasing can change byte and character counts, so each byte of the
/// normalized text records which original column produced it.
struct Normalized {
    text: String,
    origin: Vec<usize>,
    total: usize,
}

impl Normalized {
    fn new(line: &str) -> Self {
        let mut text = String::with_capacity(line.len());
        let mut origin = Vec::with_capacity(line.len());
        let mut total = 0;

        for (column, ch) in line.chars().enumerate() {
            for lower in ch.to_lowercase() {
                text.push(lower);
                origin.extend(std::iter::repeat(column).take(lower.len_utf8()));
            }
            total = column + 1;
        }

        Self { text, origin, total }
    }

    /// Original column range covering normalized bytes `start..end`
    fn columns(&self, start: usize, end: usize) -> (usize, usize) {
        let first = self.origin.get(start).copied().unwrap_or(self.total);
        let last = if end > start {
            self.origin[end - 1] + 1
        } else {
            first
        };
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognized(lines: &[&str]) -> OcrResult {
        OcrResult {
            width: lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32,
            height: lines.len() as u32,
            text: lines.iter().map(|l| l.to_string()).collect(),
            cells: Vec::new(),
        }
    }

    fn prompt_screen() -> OcrResult {
        recognized(&["user@host:~$ ls", "total 0", "user@host:~$ "])
    }

    #[test]
    fn test_literal_bottom_up() {
        let results = find_literal(&prompt_screen(), "$", &SearchConfig::default());

        assert!(results.found);
        assert_eq!(results.matches.len(), 2);
        assert_eq!(results.matches[0].line, 2);
        assert_eq!(results.matches[1].line, 0);
        assert_eq!((results.matches[0].start, results.matches[0].end), (11, 12));
        assert_eq!(results.lines_scanned, 3);
        assert_eq!(results.exit_code(), EXIT_MATCH);
    }

    #[test]
    fn test_first_only_returns_bottom_match() {
        let config = SearchConfig {
            first_only: true,
            ..Default::default()
        };
        let results = find_literal(&prompt_screen(), "user", &config);
        assert_eq!(results.matches.len(), 1);
        assert_eq!(results.matches[0].line, 2);
        assert_eq!(results.lines_scanned, 1);
    }

    #[test]
    fn test_literal_non_overlapping() {
        let results = find_literal_in_lines(&["aaaa"], "aa", &SearchConfig::default());
        let spans: Vec<_> = results.matches.iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(spans, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_multiple_matches_left_to_right_within_line() {
        let lines = ["ok", "err err", "ok"];
        let results = find_literal_in_lines(&lines, "err", &SearchConfig::default());
        let spans: Vec<_> = results.matches.iter().map(|m| (m.line, m.start)).collect();
        assert_eq!(spans, vec![(1, 0), (1, 4)]);
    }

    #[test]
    fn test_ignore_case_reports_original_text() {
        let config = SearchConfig {
            ignore_case: true,
            ..Default::default()
        };
        let results = find_literal_in_lines(&["disk error on sda"], "ERROR", &config);
        assert_eq!(results.matches.len(), 1);
        assert_eq!(results.matches[0].text, "error");
        assert_eq!((results.matches[0].start, results.matches[0].end), (5, 10));

        let results = find_regex_in_lines(&["Kernel PANIC"], "panic", &config).unwrap();
        assert_eq!(results.matches[0].text, "PANIC");
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let results = find_literal_in_lines(&["disk error"], "ERROR", &SearchConfig::default());
        assert!(!results.found);
        assert_eq!(results.exit_code(), EXIT_NO_MATCH);
    }

    #[test]
    fn test_columns_count_characters_not_bytes() {
        let line = format!("{}{} login:", crate::vision::UNKNOWN_PLACEHOLDER, 'é');
        let results = find_literal_in_lines(&[line.as_str()], "login", &SearchConfig::default());
        assert_eq!((results.matches[0].start, results.matches[0].end), (3, 8));

        let config = SearchConfig {
            ignore_case: true,
            ..Default::default()
        };
        let results = find_literal_in_lines(&[line.as_str()], "LOGIN", &config);
        assert_eq!((results.matches[0].start, results.matches[0].end), (3, 8));
        assert_eq!(results.matches[0].text, "login");
    }

    #[test]
    fn test_ignore_case_with_expanding_lowercase() {
        // 'İ' lowercases to two characters
        let config = SearchConfig {
            ignore_case: true,
            ..Default::default()
        };
        let results = find_literal_in_lines(&["İX ok"], "ok", &config);
        assert_eq!((results.matches[0].start, results.matches[0].end), (3, 5));
        assert_eq!(results.matches[0].text, "ok");
    }

    #[test]
    fn test_regex_capture_groups() {
        let lines = ["IP: 10.0.2.15", "boot ok"];
        let results =
            find_regex_in_lines(&lines, r"IP: (\d+)\.(\d+)(x)?", &SearchConfig::default()).unwrap();
        assert_eq!(results.matches.len(), 1);
        let m = &results.matches[0];
        assert_eq!(m.text, "IP: 10.0");
        assert_eq!(
            m.groups,
            vec![Some("10".to_string()), Some("0".to_string()), None]
        );
    }

    #[test]
    fn test_regex_bottom_up_order() {
        let results =
            find_regex(&prompt_screen(), r"\$\s*", &SearchConfig::default()).unwrap();
        let lines: Vec<_> = results.matches.iter().map(|m| m.line).collect();
        assert_eq!(lines, vec![2, 0]);
    }

    #[test]
    fn test_invalid_regex() {
        let err = find_regex(&prompt_screen(), "(unclosed", &SearchConfig::default()).unwrap_err();
        assert!(matches!(err, OcrError::InvalidRegex { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_PATTERN);
    }

    #[test]
    fn test_empty_literal_matches_nothing() {
        let results = find_literal(&prompt_screen(), "", &SearchConfig::default());
        assert!(!results.found);
    }

    #[test]
    fn test_search_dispatch() {
        let screen = prompt_screen();
        let config = SearchConfig::default();
        let literal = search(&screen, "~$", SearchMode::Literal, &config).unwrap();
        let regex = search(&screen, "~\\$", SearchMode::Regex, &config).unwrap();
        assert_eq!(literal.matches, regex.matches);
    }

    #[test]
    fn test_format_output() {
        let lines = ["login: root"];
        let results =
            find_regex_in_lines(&lines, r"login: (\w+)", &SearchConfig::default()).unwrap();

        let plain = results.format(&SearchConfig::default());
        assert_eq!(plain, "login: root\n");

        let detailed = results.format(&SearchConfig {
            line_numbers: true,
            ..Default::default()
        });
        assert_eq!(detailed, "0:0-11: login: root\n  $1 = root\n");

        let quiet = results.format(&SearchConfig {
            quiet: true,
            ..Default::default()
        });
        assert!(quiet.is_empty());
    }
}
