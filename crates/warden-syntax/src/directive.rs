//! Line-level helpers: brace deltas, leading tokens and `key value` directives.

/// Returns the net brace delta of a line (`{` count minus `}` count).
///
/// The configuration format has no string or comment escaping that the
/// scanner honours, so every brace character counts.
#[must_use]
pub fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0_i64, |delta, ch| match ch {
        '{' => delta + 1,
        '}' => delta - 1,
        _ => delta,
    })
}

/// Returns true when the line contains any brace character.
#[must_use]
pub(crate) fn has_brace(line: &str) -> bool {
    line.contains(['{', '}'])
}

/// Returns the first token of a line, splitting on whitespace and `{`.
///
/// `tuning{` and `tuning {` both yield `tuning`.
#[must_use]
pub fn first_token(line: &str) -> Option<&str> {
    tokens(line).next()
}

/// Splits a line into header tokens, treating `{` as a separator.
pub(crate) fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|ch: char| ch.is_whitespace() || ch == '{')
        .filter(|token| !token.is_empty())
}

/// A single `key value` line.
///
/// The indentation is kept so replacements inside blocks can reproduce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    indent: &'a str,
    key: &'a str,
    value: &'a str,
}

impl<'a> Directive<'a> {
    /// Parses a directive line.
    ///
    /// Returns `None` for blank lines and for lines containing braces, which
    /// are block headers or closers rather than directives.
    #[must_use]
    pub fn parse(line: &'a str) -> Option<Self> {
        if has_brace(line) {
            return None;
        }
        let unindented = line.trim_start();
        let indent = line.get(..line.len() - unindented.len()).unwrap_or_default();
        let body = unindented.trim_end();
        if body.is_empty() {
            return None;
        }
        let (key, value) = match body.split_once(char::is_whitespace) {
            Some((key, rest)) => (key, rest.trim()),
            None => (body, ""),
        };
        Some(Self { indent, key, value })
    }

    /// Leading whitespace before the key.
    #[must_use]
    pub const fn indent(&self) -> &'a str {
        self.indent
    }

    /// Directive key.
    #[must_use]
    pub const fn key(&self) -> &'a str {
        self.key
    }

    /// Directive value with surrounding whitespace removed.
    #[must_use]
    pub const fn value(&self) -> &'a str {
        self.value
    }

    /// Returns true when the value equals `expected`, ignoring whitespace runs.
    #[must_use]
    pub fn value_matches(&self, expected: &str) -> bool {
        self.value
            .split_whitespace()
            .eq(expected.split_whitespace())
    }
}
