//! In-memory model of the managed configuration document.
//!
//! A [`ConfigDocument`] is an ordered sequence of lines addressed by 1-based
//! line number. Parsing and rendering are lossless: an unmodified document
//! renders back to the exact bytes it was parsed from, which keeps diffs of
//! patched documents limited to the lines that were actually targeted.

use crate::directive::{Directive, brace_delta, has_brace};
use crate::scanner::{BlockFilter, BlockScanner};

/// The full text content of a managed configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl ConfigDocument {
    /// Parses text into a line sequence.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        Self {
            lines: body.split('\n').map(str::to_owned).collect(),
            trailing_newline,
        }
    }

    /// Builds a document from owned lines, terminated by a newline.
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        let trailing_newline = !lines.is_empty();
        Self {
            lines,
            trailing_newline,
        }
    }

    /// Renders the document back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }

    /// Byte length of the rendered document.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        let separators = self.lines.len().saturating_sub(1);
        let body: usize = self.lines.iter().map(String::len).sum();
        body + separators + usize::from(self.trailing_newline)
    }

    /// Number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns true when the document has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the line at a 1-based position.
    #[must_use]
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    /// Iterates over lines paired with their 1-based numbers.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(index, line)| (index + 1, line.as_str()))
    }

    /// Iterates over the raw lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Replaces the line at a 1-based position, returning the previous text.
    pub fn replace_line(&mut self, number: usize, text: impl Into<String>) -> Option<String> {
        let slot = number
            .checked_sub(1)
            .and_then(|index| self.lines.get_mut(index))?;
        Some(std::mem::replace(slot, text.into()))
    }

    /// Inserts a line so that it becomes line `number`.
    ///
    /// Positions past the end append. Inserting into an empty document also
    /// terminates it with a newline.
    pub fn insert_line(&mut self, number: usize, text: impl Into<String>) {
        let index = number.saturating_sub(1).min(self.lines.len());
        if self.lines.is_empty() {
            self.trailing_newline = true;
        }
        self.lines.insert(index, text.into());
    }

    /// Removes the line at a 1-based position.
    pub fn remove_line(&mut self, number: usize) -> Option<String> {
        let index = number.checked_sub(1)?;
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    /// Lazily scans top-level blocks selected by `filter`.
    ///
    /// The scan holds no state across calls and may be re-run freely.
    #[must_use]
    pub fn scan<'a>(&'a self, filter: &'a BlockFilter) -> BlockScanner<'a> {
        BlockScanner::new(self, filter)
    }

    /// Returns the first top-level line whose leading token is `keyword`.
    ///
    /// This is the live-boundary lookup used when freezing: a keyword test
    /// on the header line alone, independent of block contents.
    #[must_use]
    pub fn boundary_line(&self, keyword: &str) -> Option<usize> {
        let mut depth = 0_i64;
        for (number, line) in self.numbered_lines() {
            if depth <= 0 && crate::directive::first_token(line) == Some(keyword) {
                return Some(number);
            }
            depth = (depth + brace_delta(line)).max(0);
        }
        None
    }

    /// Splits the document into lines strictly before `number` and the rest.
    #[must_use]
    pub fn split_before(&self, number: usize) -> (Self, Self) {
        let index = number.saturating_sub(1).min(self.lines.len());
        let (head, tail) = self.lines.split_at(index);
        let prefix = Self::from_lines(head.to_vec());
        let suffix = Self {
            lines: tail.to_vec(),
            trailing_newline: self.trailing_newline && !tail.is_empty(),
        };
        (prefix, suffix)
    }

    /// Concatenates `self` with `suffix`.
    ///
    /// The result keeps the suffix's trailing newline convention, or the
    /// prefix's when the suffix is empty.
    #[must_use]
    pub fn concat(&self, suffix: &Self) -> Self {
        let mut lines = self.lines.clone();
        lines.extend(suffix.lines.iter().cloned());
        let trailing_newline = if suffix.is_empty() {
            self.trailing_newline
        } else {
            suffix.trailing_newline
        };
        Self {
            lines,
            trailing_newline,
        }
    }

    /// Iterates over top-level directives as `(line, directive)` pairs.
    ///
    /// A line counts as top level when no block is open before it. Block
    /// headers whose opening brace sits on the next line are excluded.
    pub fn top_level_directives(&self) -> impl Iterator<Item = (usize, Directive<'_>)> {
        let mut depth = 0_i64;
        self.numbered_lines().filter_map(move |(number, line)| {
            let before = depth;
            depth = (depth + brace_delta(line)).max(0);
            if before > 0 || has_brace(line) || self.opens_on_next_line(number) {
                return None;
            }
            Directive::parse(line).map(|directive| (number, directive))
        })
    }

    /// Returns true when the next non-blank line after `number` starts with `{`.
    pub(crate) fn opens_on_next_line(&self, number: usize) -> bool {
        self.next_non_blank(number)
            .and_then(|next| self.line(next))
            .is_some_and(|line| line.trim_start().starts_with('{'))
    }

    /// Returns the first non-blank line number after `number`.
    pub(crate) fn next_non_blank(&self, number: usize) -> Option<usize> {
        self.lines
            .get(number..)?
            .iter()
            .position(|line| !line.trim().is_empty())
            .map(|offset| number + offset + 1)
    }
}

impl From<&str> for ConfigDocument {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl std::fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
