//! Depth-tracking block scanner.
//!
//! The scanner walks the document once, tracking only the net brace delta of
//! each line. Every top-level block is followed so that headers nested inside
//! other blocks are never mistaken for top-level candidates, but only blocks
//! selected by the [`BlockFilter`] are emitted.
//!
//! Block entry is deferred until a `{` is actually seen, so a header may
//! carry its opening brace on the same line or on the next non-blank line.
//! A candidate header that is never followed by `{` is dropped and the line
//! after it is re-examined at top level.

use crate::directive::{Directive, brace_delta, tokens};
use crate::document::ConfigDocument;

/// Matches a block header by keyword and optional identifying token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPattern {
    keyword: String,
    token: Option<String>,
}

impl BlockPattern {
    /// Matches any block introduced by `keyword`.
    #[must_use]
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            token: None,
        }
    }

    /// Additionally requires the token after the keyword to equal `token`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Header keyword.
    #[must_use]
    pub fn keyword_str(&self) -> &str {
        &self.keyword
    }

    /// Optional identifying token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns true when `line` is a header for this pattern.
    #[must_use]
    pub fn matches_header(&self, line: &str) -> bool {
        let mut parts = tokens(line);
        if parts.next() != Some(self.keyword.as_str()) {
            return false;
        }
        match &self.token {
            Some(token) => parts.next() == Some(token.as_str()),
            None => true,
        }
    }
}

impl std::fmt::Display for BlockPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.token {
            Some(token) => write!(f, "{} {token}", self.keyword),
            None => f.write_str(&self.keyword),
        }
    }
}

/// Matches a `key value` line inside a block, e.g. `secure 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePattern {
    key: String,
    value: String,
}

impl AttributePattern {
    /// Builds an attribute pattern.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns true when the line is a directive with this key and value.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        Directive::parse(line)
            .is_some_and(|directive| {
                directive.key() == self.key && directive.value_matches(&self.value)
            })
    }
}

impl std::fmt::Display for AttributePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.value)
    }
}

/// Selects which top-level blocks a scan emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFilter {
    /// Blocks whose header matches the pattern.
    Header(BlockPattern),
    /// Blocks containing a line that matches the attribute, optionally
    /// restricted to headers matching a pattern.
    Attribute {
        /// Optional header restriction.
        header: Option<BlockPattern>,
        /// Attribute that must appear inside the block.
        attribute: AttributePattern,
    },
}

impl BlockFilter {
    /// Selects blocks by header.
    #[must_use]
    pub const fn header(pattern: BlockPattern) -> Self {
        Self::Header(pattern)
    }

    /// Selects blocks containing `attribute`.
    #[must_use]
    pub const fn attribute(attribute: AttributePattern) -> Self {
        Self::Attribute {
            header: None,
            attribute,
        }
    }

    /// Restricts an attribute filter to headers matching `pattern`.
    ///
    /// Header filters are returned unchanged.
    #[must_use]
    pub fn within(self, pattern: BlockPattern) -> Self {
        match self {
            Self::Attribute { attribute, .. } => Self::Attribute {
                header: Some(pattern),
                attribute,
            },
            header @ Self::Header(_) => header,
        }
    }

    fn header_matches(&self, line: &str) -> bool {
        match self {
            Self::Header(pattern) => pattern.matches_header(line),
            Self::Attribute { header, .. } => header
                .as_ref()
                .is_none_or(|pattern| pattern.matches_header(line)),
        }
    }

    fn attribute_matches(&self, line: &str) -> bool {
        match self {
            Self::Header(_) => false,
            Self::Attribute { attribute, .. } => attribute.matches(line),
        }
    }

    const fn requires_attribute(&self) -> bool {
        matches!(self, Self::Attribute { .. })
    }
}

impl std::fmt::Display for BlockFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header(pattern) => write!(f, "{pattern}"),
            Self::Attribute {
                header: Some(pattern),
                attribute,
            } => write!(f, "{pattern} with `{attribute}`"),
            Self::Attribute {
                header: None,
                attribute,
            } => write!(f, "block with `{attribute}`"),
        }
    }
}

/// An inclusive, 1-based line range `[start, end]` covering one block.
///
/// `start` is the header line and `end` the line at which the cumulative
/// brace depth returns to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    start: usize,
    end: usize,
}

impl BlockRange {
    /// Builds a range.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Header line.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Closing line.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Returns true when the block opens and closes on one line.
    #[must_use]
    pub const fn is_single_line(&self) -> bool {
        self.start == self.end
    }

    /// Returns true when `line` falls inside the range.
    #[must_use]
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// Directives that are direct children of the block.
    ///
    /// Lines inside nested sub-blocks and the header and closing lines are
    /// skipped.
    pub fn direct_children<'a>(
        &self,
        document: &'a ConfigDocument,
    ) -> impl Iterator<Item = (usize, Directive<'a>)> + 'a {
        let range = *self;
        let mut depth = 0_i64;
        document
            .numbered_lines()
            .skip(range.start - 1)
            .take(range.end + 1 - range.start)
            .filter_map(move |(number, line)| {
                let before = depth;
                depth += brace_delta(line);
                if number == range.start || number == range.end || before != 1 {
                    return None;
                }
                Directive::parse(line).map(|directive| (number, directive))
            })
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    TopLevel,
    Pending {
        start: usize,
    },
    Open {
        start: usize,
        depth: i64,
        candidate: bool,
        attribute_seen: bool,
    },
}

/// Lazy iterator over top-level blocks selected by a [`BlockFilter`].
///
/// Ranges are produced in document order and never overlap.
#[derive(Debug)]
pub struct BlockScanner<'a> {
    document: &'a ConfigDocument,
    filter: &'a BlockFilter,
    next_line: usize,
    state: ScanState,
}

impl<'a> BlockScanner<'a> {
    /// Starts a fresh scan at line 1.
    #[must_use]
    pub const fn new(document: &'a ConfigDocument, filter: &'a BlockFilter) -> Self {
        Self {
            document,
            filter,
            next_line: 1,
            state: ScanState::TopLevel,
        }
    }

    /// Processes a line at top level, returning a range for single-line blocks.
    fn enter(&mut self, number: usize, line: &str) -> Option<BlockRange> {
        let delta = brace_delta(line);
        let candidate = self.filter.header_matches(line);
        if line.contains('{') {
            if delta > 0 {
                self.state = ScanState::Open {
                    start: number,
                    depth: delta,
                    candidate,
                    attribute_seen: false,
                };
                return None;
            }
            // Opens and closes on the same line.
            return (candidate && !self.filter.requires_attribute())
                .then(|| BlockRange::new(number, number));
        }
        if candidate && !line.contains('}') {
            self.state = ScanState::Pending { start: number };
        }
        None
    }

    fn step(&mut self, number: usize, line: &str) -> Option<BlockRange> {
        match self.state {
            ScanState::TopLevel => self.enter(number, line),
            ScanState::Pending { start } => {
                if line.trim().is_empty() {
                    return None;
                }
                let delta = brace_delta(line);
                if line.trim_start().starts_with('{') && delta > 0 {
                    self.state = ScanState::Open {
                        start,
                        depth: delta,
                        candidate: true,
                        attribute_seen: false,
                    };
                    return None;
                }
                // The header never opened; treat this line as top level.
                self.state = ScanState::TopLevel;
                self.enter(number, line)
            }
            ScanState::Open {
                start,
                depth,
                candidate,
                attribute_seen,
            } => {
                let remaining = depth + brace_delta(line);
                let matched =
                    attribute_seen || (candidate && self.filter.attribute_matches(line));
                if remaining > 0 {
                    self.state = ScanState::Open {
                        start,
                        depth: remaining,
                        candidate,
                        attribute_seen: matched,
                    };
                    return None;
                }
                self.state = ScanState::TopLevel;
                let selected = candidate && (matched || !self.filter.requires_attribute());
                selected.then(|| BlockRange::new(start, number))
            }
        }
    }
}

impl Iterator for BlockScanner<'_> {
    type Item = BlockRange;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = self.document.line(self.next_line) {
            let number = self.next_line;
            self.next_line += 1;
            if let Some(range) = self.step(number, line) {
                return Some(range);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for BlockScanner<'_> {}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn ranges(text: &str, filter: &BlockFilter) -> Vec<(usize, usize)> {
        let document = ConfigDocument::parse(text);
        document
            .scan(filter)
            .map(|range| (range.start(), range.end()))
            .collect()
    }

    fn tuning() -> BlockFilter {
        BlockFilter::header(BlockPattern::keyword("tuning"))
    }

    #[test]
    fn finds_block_with_brace_on_header_line() {
        let text = "serverName web\ntuning {\n  maxConnections 10\n}\n";
        assert_eq!(ranges(text, &tuning()), vec![(2, 4)]);
    }

    #[test]
    fn finds_block_with_brace_on_next_line() {
        let text = "tuning\n\n{\n  maxConnections 10\n}\n";
        assert_eq!(ranges(text, &tuning()), vec![(1, 5)]);
    }

    #[test]
    fn header_without_brace_is_not_a_block() {
        let text = "tuning\nmaxConnections 10\ntuning {\n}\n";
        assert_eq!(ranges(text, &tuning()), vec![(3, 4)]);
    }

    #[test]
    fn unterminated_header_at_end_of_input_yields_nothing() {
        assert!(ranges("tuning\n", &tuning()).is_empty());
        assert!(ranges("tuning {\n  maxConnections 10\n", &tuning()).is_empty());
    }

    #[test]
    fn nested_headers_are_not_top_level_candidates() {
        let text = "module cache {\n  tuning {\n  }\n}\ntuning {\n}\n";
        assert_eq!(ranges(text, &tuning()), vec![(5, 6)]);
    }

    #[test]
    fn nested_blocks_extend_the_outer_range() {
        let text = "virtualhost a {\n  rewrite {\n    enable 1\n  }\n}\n";
        let filter = BlockFilter::header(BlockPattern::keyword("virtualhost"));
        assert_eq!(ranges(text, &filter), vec![(1, 5)]);
    }

    #[rstest]
    #[case(BlockPattern::keyword("errorlog"), vec![(1, 3), (4, 6)])]
    #[case(BlockPattern::keyword("errorlog").with_token("/var/log/b.log"), vec![(4, 6)])]
    #[case(BlockPattern::keyword("accesslog"), vec![])]
    fn header_token_narrows_matches(
        #[case] pattern: BlockPattern,
        #[case] expected: Vec<(usize, usize)>,
    ) {
        let text = "errorlog /var/log/a.log {\n  logLevel DEBUG\n}\n\
                    errorlog /var/log/b.log {\n  logLevel DEBUG\n}\n";
        assert_eq!(ranges(text, &BlockFilter::header(pattern)), expected);
    }

    #[test]
    fn single_line_block_is_reported() {
        assert_eq!(ranges("tuning { }\n", &tuning()), vec![(1, 1)]);
    }

    #[test]
    fn attribute_filter_selects_blocks_containing_attribute() {
        let text = "listener Default {\n  address *:80\n}\n\
                    listener SSL {\n  address *:443\n  secure   1\n}\n";
        let filter = BlockFilter::attribute(AttributePattern::new("secure", "1"))
            .within(BlockPattern::keyword("listener"));
        assert_eq!(ranges(text, &filter), vec![(4, 7)]);
    }

    #[test]
    fn attribute_filter_respects_header_restriction() {
        let text = "virtualhost a {\n  secure 1\n}\nlistener b {\n  secure 1\n}\n";
        let unrestricted = BlockFilter::attribute(AttributePattern::new("secure", "1"));
        let restricted = unrestricted.clone().within(BlockPattern::keyword("listener"));
        assert_eq!(ranges(text, &unrestricted), vec![(1, 3), (4, 6)]);
        assert_eq!(ranges(text, &restricted), vec![(4, 6)]);
    }

    #[test]
    fn scan_is_restartable() {
        let document = ConfigDocument::parse("tuning {\n}\ntuning {\n}\n");
        let filter = tuning();
        let first: Vec<_> = document.scan(&filter).collect();
        let second: Vec<_> = document.scan(&filter).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn direct_children_skip_nested_blocks() {
        let document = ConfigDocument::parse(
            "virtualhost a {\n  docRoot /srv\n  rewrite {\n    enable 1\n  }\n  vhDomain a\n}\n",
        );
        let range = BlockRange::new(1, 7);
        let keys: Vec<_> = range
            .direct_children(&document)
            .map(|(line, directive)| (line, directive.key()))
            .collect();
        assert_eq!(keys, vec![(2, "docRoot"), (6, "vhDomain")]);
    }

    #[test]
    fn direct_children_handle_brace_on_next_line() {
        let document = ConfigDocument::parse("tuning\n{\n  maxConnections 10\n}\n");
        let keys: Vec<_> = BlockRange::new(1, 4)
            .direct_children(&document)
            .map(|(line, directive)| (line, directive.key()))
            .collect();
        assert_eq!(keys, vec![(3, "maxConnections")]);
    }
}
