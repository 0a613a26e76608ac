//! Idempotent, label-aware edits of a configuration document.
//!
//! A [`DocumentPatcher`] owns a working copy of the document and applies the
//! four primitives to it, recording one [`ChangeRecord`] per directive that
//! was replaced, inserted, removed or deliberately skipped. Re-applying the
//! same primitive to its own output records nothing and changes nothing.
//! Every edit replaces, inserts or removes whole lines; no other line's bytes
//! are touched.

use std::fmt;

use warden_syntax::{BlockFilter, BlockPattern, BlockRange, ConfigDocument};

/// Column at which values start on lines written from scratch.
pub const KEY_COLUMN_WIDTH: usize = 26;

/// Indentation used when a block has no children to copy it from.
const DEFAULT_INDENT: &str = "  ";

/// How a directive was affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// An existing line's value was rewritten.
    Replaced {
        /// Value before the edit.
        previous: String,
    },
    /// A new line was added.
    Inserted,
    /// The line was deleted.
    Removed,
    /// Nothing was written; the reason says why.
    Skipped {
        /// Why the primitive did nothing.
        reason: SkipReason,
    },
}

/// Why a primitive left the document alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The desired value was empty.
    EmptyValue,
    /// The key or value would not read back as the same directive.
    InvalidDirective,
    /// No block matched the pattern.
    NoMatchingBlock,
    /// The matching block opens and closes on one line.
    SingleLineBlock,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyValue => "empty value",
            Self::InvalidDirective => "invalid directive",
            Self::NoMatchingBlock => "no matching block",
            Self::SingleLineBlock => "single-line block",
        })
    }
}

/// One directive-level effect of a primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    field: String,
    value: String,
    line: Option<usize>,
    kind: ChangeKind,
}

impl ChangeRecord {
    fn new(field: String, value: &str, line: Option<usize>, kind: ChangeKind) -> Self {
        Self {
            field,
            value: value.to_owned(),
            line,
            kind,
        }
    }

    /// Qualified directive name, e.g. `tuning.maxConnections`.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value written, or the value that would have been written.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Line affected in the document the primitive was applied to.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        self.line
    }

    /// Effect on the document.
    #[must_use]
    pub const fn kind(&self) -> &ChangeKind {
        &self.kind
    }

    /// Returns `true` when the record describes an actual edit.
    #[must_use]
    pub const fn is_edit(&self) -> bool {
        !matches!(self.kind, ChangeKind::Skipped { .. })
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChangeKind::Removed => write!(f, "{} => (removed)", self.field),
            ChangeKind::Skipped { reason } => {
                write!(f, "{} => {} (skipped: {reason})", self.field, self.value)
            }
            ChangeKind::Replaced { .. } | ChangeKind::Inserted => {
                write!(f, "{} => {}", self.field, self.value)
            }
        }
    }
}

/// Applies patch primitives to a working copy of a document.
#[derive(Debug, Clone)]
pub struct DocumentPatcher {
    document: ConfigDocument,
    changes: Vec<ChangeRecord>,
}

impl DocumentPatcher {
    /// Starts patching `document`.
    #[must_use]
    pub const fn new(document: ConfigDocument) -> Self {
        Self {
            document,
            changes: Vec::new(),
        }
    }

    /// Current state of the working copy.
    #[must_use]
    pub const fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Records accumulated so far.
    #[must_use]
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Returns the patched document and the records describing it.
    #[must_use]
    pub fn finish(self) -> (ConfigDocument, Vec<ChangeRecord>) {
        (self.document, self.changes)
    }

    /// Sets a top-level directive.
    ///
    /// The first top-level `key` line has its value rewritten with the value
    /// starting at [`KEY_COLUMN_WIDTH`]; when there is none, the directive is
    /// inserted as line 1. Nothing happens when `value` is empty or already
    /// current. A key or value that could not be read back is recorded as
    /// skipped.
    pub fn set_top_level(&mut self, key: &str, value: &str) {
        if !is_writable(key, value) {
            self.skip(key.to_owned(), value, SkipReason::InvalidDirective);
            return;
        }
        if value.is_empty() {
            self.skip(key.to_owned(), value, SkipReason::EmptyValue);
            return;
        }
        let existing = self
            .document
            .top_level_directives()
            .find(|(_, directive)| directive.key() == key)
            .map(|(number, directive)| {
                (
                    number,
                    directive.value_matches(value),
                    directive.value().to_owned(),
                )
            });
        match existing {
            Some((_, true, _)) => {}
            Some((number, false, previous)) => {
                self.document
                    .replace_line(number, format_directive("", key, value));
                self.record(key.to_owned(), value, number, ChangeKind::Replaced { previous });
            }
            None => {
                self.document.insert_line(1, format_directive("", key, value));
                self.record(key.to_owned(), value, 1, ChangeKind::Inserted);
            }
        }
    }

    /// Sets `key` inside the first top-level block matching `pattern`.
    ///
    /// An existing direct child keeps its indentation and spacing and only
    /// its value changes; otherwise the directive is inserted before the
    /// block's closing line. An empty value or a missing block is recorded
    /// as skipped.
    pub fn set_in_block(&mut self, pattern: &BlockPattern, key: &str, value: &str) {
        let field = format!("{pattern}.{key}");
        if !is_writable(key, value) {
            self.skip(field, value, SkipReason::InvalidDirective);
            return;
        }
        if value.is_empty() {
            self.skip(field, value, SkipReason::EmptyValue);
            return;
        }
        let filter = BlockFilter::header(pattern.clone());
        let Some(range) = self.document.scan(&filter).next() else {
            self.skip(field, value, SkipReason::NoMatchingBlock);
            return;
        };
        let mut working = self.document.clone();
        if let Some(record) = upsert(&mut working, range, field, key, value) {
            self.document = working;
            self.changes.push(record);
        }
    }

    /// Sets `key` in every block selected by `filter`.
    ///
    /// Blocks are edited bottom-up on a private copy so earlier ranges stay
    /// valid; the copy replaces the working document once every block has
    /// been processed. A document with no selected block is left exactly as
    /// it was.
    pub fn set_in_filtered_blocks(&mut self, filter: &BlockFilter, key: &str, value: &str) {
        if !is_writable(key, value) {
            self.skip(format!("{filter}.{key}"), value, SkipReason::InvalidDirective);
            return;
        }
        if value.is_empty() {
            self.skip(format!("{filter}.{key}"), value, SkipReason::EmptyValue);
            return;
        }
        let ranges: Vec<BlockRange> = self.document.scan(filter).collect();
        if ranges.is_empty() {
            self.skip(format!("{filter}.{key}"), value, SkipReason::NoMatchingBlock);
            return;
        }
        let mut working = self.document.clone();
        let mut records = Vec::new();
        for range in ranges.into_iter().rev() {
            let field = format!("{}.{key}", block_label(&working, range));
            records.extend(upsert(&mut working, range, field, key, value));
        }
        records.reverse();
        self.document = working;
        self.changes.extend(records);
    }

    /// Removes every direct child whose key is in `keys` from every block
    /// selected by `filter`.
    pub fn strip_keys_in_filtered_blocks(&mut self, filter: &BlockFilter, keys: &[&str]) {
        let ranges: Vec<BlockRange> = self.document.scan(filter).collect();
        let mut working = self.document.clone();
        let mut records = Vec::new();
        for range in ranges.into_iter().rev() {
            let label = block_label(&working, range);
            let doomed: Vec<(usize, String)> = range
                .direct_children(&working)
                .filter(|(_, directive)| keys.contains(&directive.key()))
                .map(|(number, directive)| (number, directive.key().to_owned()))
                .collect();
            for (number, key) in doomed.into_iter().rev() {
                working.remove_line(number);
                records.push(ChangeRecord::new(
                    format!("{label}.{key}"),
                    "",
                    Some(number),
                    ChangeKind::Removed,
                ));
            }
        }
        if records.is_empty() {
            return;
        }
        records.reverse();
        self.document = working;
        self.changes.extend(records);
    }

    fn record(&mut self, field: String, value: &str, line: usize, kind: ChangeKind) {
        self.changes
            .push(ChangeRecord::new(field, value, Some(line), kind));
    }

    fn skip(&mut self, field: String, value: &str, reason: SkipReason) {
        self.changes.push(ChangeRecord::new(
            field,
            value,
            None,
            ChangeKind::Skipped { reason },
        ));
    }
}

/// Replaces or inserts `key` among the direct children of `range`.
fn upsert(
    document: &mut ConfigDocument,
    range: BlockRange,
    field: String,
    key: &str,
    value: &str,
) -> Option<ChangeRecord> {
    if range.is_single_line() {
        return Some(ChangeRecord::new(
            field,
            value,
            Some(range.start()),
            ChangeKind::Skipped {
                reason: SkipReason::SingleLineBlock,
            },
        ));
    }
    let mut indent = None;
    let mut existing = None;
    for (number, directive) in range.direct_children(document) {
        indent.get_or_insert_with(|| directive.indent().to_owned());
        if directive.key() == key {
            existing = Some((
                number,
                directive.value_matches(value),
                directive.value().to_owned(),
            ));
            break;
        }
    }
    match existing {
        Some((_, true, _)) => None,
        Some((number, false, previous)) => {
            let line = document.line(number).map(|line| rewrite_value(line, value))?;
            document.replace_line(number, line);
            Some(ChangeRecord::new(
                field,
                value,
                Some(number),
                ChangeKind::Replaced { previous },
            ))
        }
        None => {
            let indent = indent.unwrap_or_else(|| DEFAULT_INDENT.to_owned());
            document.insert_line(range.end(), format_directive(&indent, key, value));
            Some(ChangeRecord::new(
                field,
                value,
                Some(range.end()),
                ChangeKind::Inserted,
            ))
        }
    }
}

/// Returns `true` when `key value` parses back to the same key and value.
///
/// Keys are single brace-free tokens; values may not contain braces or line
/// breaks.
fn is_writable(key: &str, value: &str) -> bool {
    let key_ok = !key.is_empty()
        && !key.contains(|c: char| c.is_whitespace() || c == '{' || c == '}');
    key_ok && !value.contains(['{', '}', '\n', '\r'])
}

/// Formats a fresh directive line with its value at [`KEY_COLUMN_WIDTH`].
#[must_use]
pub fn format_directive(indent: &str, key: &str, value: &str) -> String {
    let width = KEY_COLUMN_WIDTH.saturating_sub(indent.len()).max(key.len() + 1);
    format!("{indent}{key:<width$}{value}")
}

/// Rewrites the value of `line`, keeping its indentation, key and the
/// whitespace between key and value.
fn rewrite_value(line: &str, value: &str) -> String {
    let body = line.trim_start();
    let (indent, _) = line.split_at(line.len() - body.len());
    let key_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let (key, rest) = body.split_at(key_end);
    let gap_len = rest.len() - rest.trim_start().len();
    let (gap, _) = rest.split_at(gap_len);
    let gap = if gap.is_empty() { " " } else { gap };
    format!("{indent}{key}{gap}{value}")
}

/// Human label for a block: its header keyword and first token.
fn block_label(document: &ConfigDocument, range: BlockRange) -> String {
    let header = document.line(range.start()).unwrap_or_default();
    header
        .split(|c: char| c.is_whitespace() || c == '{')
        .filter(|token| !token.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests;
