//! Unit tests for the patch primitives.

use rstest::{fixture, rstest};
use warden_syntax::{AttributePattern, BlockFilter, BlockPattern, ConfigDocument};

use super::*;

fn secure_listeners() -> BlockFilter {
    BlockFilter::attribute(AttributePattern::new("secure", "1"))
        .within(BlockPattern::keyword("listener"))
}

fn changed_lines(before: &ConfigDocument, after: &ConfigDocument) -> Vec<usize> {
    before
        .numbered_lines()
        .zip(after.lines())
        .filter(|((_, old), new)| old != new)
        .map(|((number, _), _)| number)
        .collect()
}

#[fixture]
fn two_listeners() -> ConfigDocument {
    ConfigDocument::parse(concat!(
        "serverName                web\n",
        "listener Default {\n",
        "  address                 *:80\n",
        "  sslCert                 /etc/plain.pem\n",
        "}\n",
        "listener SSL {\n",
        "  address                 *:443\n",
        "  secure                  1\n",
        "  sslCert                 /etc/cert.pem\n",
        "  sslKey                  /etc/key.pem\n",
        "}\n",
    ))
}

// =============================================================================
// set_top_level
// =============================================================================

#[test]
fn top_level_value_is_replaced_in_place() {
    let document = ConfigDocument::parse("serverName web\nuser nobody\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_top_level("user", "lsadm");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.line(2), Some("user                      lsadm"));
    assert_eq!(patched.line(1), Some("serverName web"));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].to_string(), "user => lsadm");
    assert_eq!(
        changes[0].kind(),
        &ChangeKind::Replaced {
            previous: "nobody".to_owned()
        }
    );
}

#[test]
fn missing_top_level_directive_is_inserted_first() {
    let document = ConfigDocument::parse("serverName web\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_top_level("showVersionNumber", "0");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.line(1), Some("showVersionNumber         0"));
    assert_eq!(patched.line(2), Some("serverName web"));
    assert_eq!(changes[0].kind(), &ChangeKind::Inserted);
    assert_eq!(changes[0].line(), Some(1));
}

#[test]
fn set_top_level_twice_equals_once() {
    let document = ConfigDocument::parse("serverName web\ntuning {\n  user nobody\n}\n");
    let mut once = DocumentPatcher::new(document);
    once.set_top_level("user", "lsadm");
    let (first, _) = once.finish();

    let mut twice = DocumentPatcher::new(first.clone());
    twice.set_top_level("user", "lsadm");
    let (second, changes) = twice.finish();

    assert_eq!(first, second);
    assert!(changes.is_empty());
}

#[test]
fn block_children_are_not_top_level() {
    let document = ConfigDocument::parse("tuning {\n  maxConnections 10\n}\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_top_level("maxConnections", "20");
    let (patched, _) = patcher.finish();

    assert_eq!(patched.line(1), Some("maxConnections            20"));
    assert_eq!(patched.line(3), Some("  maxConnections 10"));
}

#[test]
fn matching_value_with_different_spacing_is_left_alone() {
    let mut exact = DocumentPatcher::new(ConfigDocument::parse("indexFiles   a  b\n"));
    exact.set_top_level("indexFiles", "a b");
    assert_eq!(exact.document().render(), "indexFiles   a  b\n");
    assert!(exact.changes().is_empty());
}

#[test]
fn empty_value_is_skipped() {
    let document = ConfigDocument::parse("serverName web\n");
    let mut patcher = DocumentPatcher::new(document.clone());
    patcher.set_top_level("user", "");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched, document);
    assert_eq!(
        changes[0].kind(),
        &ChangeKind::Skipped {
            reason: SkipReason::EmptyValue
        }
    );
    assert!(!changes[0].is_edit());
}

#[rstest]
#[case("max Conn", "10")]
#[case("", "10")]
#[case("headers", "{x}")]
#[case("tuning{", "1")]
#[case("banner", "two\nlines")]
fn unreadable_directives_are_skipped_everywhere(#[case] key: &str, #[case] value: &str) {
    let document = ConfigDocument::parse("serverName web\ntuning {\n  maxConnections 10\n}\n");
    let mut patcher = DocumentPatcher::new(document.clone());
    patcher.set_top_level(key, value);
    patcher.set_in_block(&BlockPattern::keyword("tuning"), key, value);
    patcher.set_in_filtered_blocks(
        &BlockFilter::header(BlockPattern::keyword("tuning")),
        key,
        value,
    );
    let (patched, changes) = patcher.finish();

    assert_eq!(patched, document);
    assert_eq!(changes.len(), 3);
    assert!(changes.iter().all(|change| change.kind()
        == &ChangeKind::Skipped {
            reason: SkipReason::InvalidDirective
        }));
}

// =============================================================================
// set_in_block
// =============================================================================

#[test]
fn tuning_value_change_touches_only_that_line() {
    let document = ConfigDocument::parse(concat!(
        "serverName web\n",
        "tuning {\n",
        "  maxConnections 1000\n",
        "  maxSSLConnections 1000\n",
        "}\n",
    ));
    let mut patcher = DocumentPatcher::new(document.clone());
    patcher.set_in_block(&BlockPattern::keyword("tuning"), "maxConnections", "100000");
    let (patched, changes) = patcher.finish();

    assert_eq!(changed_lines(&document, &patched), vec![3]);
    assert_eq!(patched.line(3), Some("  maxConnections 100000"));
    assert_eq!(patched.line_count(), document.line_count());
    assert_eq!(changes[0].to_string(), "tuning.maxConnections => 100000");
}

#[test]
fn missing_block_child_is_inserted_before_closing_line() {
    let document = ConfigDocument::parse("tuning {\n    maxConnections 1000\n}\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_block(&BlockPattern::keyword("tuning"), "keepAliveTimeout", "5");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.line(3), Some("    keepAliveTimeout      5"));
    assert_eq!(patched.line(4), Some("}"));
    assert_eq!(changes[0].kind(), &ChangeKind::Inserted);
}

#[test]
fn insert_into_empty_block_uses_default_indent() {
    let document = ConfigDocument::parse("tuning\n{\n}\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_block(&BlockPattern::keyword("tuning"), "maxConnections", "10");
    let (patched, _) = patcher.finish();

    assert_eq!(patched.render(), "tuning\n{\n  maxConnections          10\n}\n");
}

#[test]
fn nested_sub_block_lines_are_not_addressed() {
    let document = ConfigDocument::parse(concat!(
        "errorlog logs/error.log {\n",
        "  rollingSize 10M\n",
        "  filter {\n",
        "    logLevel DEBUG\n",
        "  }\n",
        "}\n",
    ));
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_block(&BlockPattern::keyword("errorlog"), "logLevel", "WARN");
    let (patched, _) = patcher.finish();

    assert_eq!(patched.line(4), Some("    logLevel DEBUG"));
    assert_eq!(patched.line(6), Some("  logLevel                WARN"));
    assert_eq!(patched.line(7), Some("}"));
}

#[test]
fn only_the_first_matching_block_is_edited() {
    let document = ConfigDocument::parse("tuning {\n  a 1\n}\ntuning {\n  a 1\n}\n");
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_block(&BlockPattern::keyword("tuning"), "a", "2");
    let (patched, _) = patcher.finish();

    assert_eq!(patched.line(2), Some("  a 2"));
    assert_eq!(patched.line(5), Some("  a 1"));
}

#[rstest]
#[case("serverName web\n", SkipReason::NoMatchingBlock)]
#[case("tuning { maxConnections 10 }\n", SkipReason::SingleLineBlock)]
fn unusable_blocks_are_skipped(#[case] text: &str, #[case] reason: SkipReason) {
    let document = ConfigDocument::parse(text);
    let mut patcher = DocumentPatcher::new(document.clone());
    patcher.set_in_block(&BlockPattern::keyword("tuning"), "maxConnections", "20");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.render(), text);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind(), &ChangeKind::Skipped { reason });
}

#[test]
fn set_in_block_is_idempotent() {
    let document = ConfigDocument::parse("tuning {\n  a 1\n}\n");
    let pattern = BlockPattern::keyword("tuning");
    let mut first = DocumentPatcher::new(document);
    first.set_in_block(&pattern, "b", "2");
    let (once, _) = first.finish();

    let mut second = DocumentPatcher::new(once.clone());
    second.set_in_block(&pattern, "b", "2");
    let (twice, changes) = second.finish();

    assert_eq!(once, twice);
    assert!(changes.is_empty());
}

// =============================================================================
// Filtered blocks
// =============================================================================

#[rstest]
fn filtered_set_touches_only_secure_listener(two_listeners: ConfigDocument) {
    let mut patcher = DocumentPatcher::new(two_listeners.clone());
    patcher.set_in_filtered_blocks(&secure_listeners(), "sslProtocol", "24");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.line_count(), two_listeners.line_count() + 1);
    assert_eq!(patched.line(11), Some("  sslProtocol             24"));
    for number in 1..=10 {
        assert_eq!(patched.line(number), two_listeners.line(number));
    }
    assert_eq!(changes[0].to_string(), "listener SSL.sslProtocol => 24");
}

#[test]
fn filtered_set_on_control_document_is_byte_identical() {
    let text = "listener Default {\n  address *:80\n}\nvirtualhost A {\n  secure 1\n}";
    let document = ConfigDocument::parse(text);
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_filtered_blocks(&secure_listeners(), "sslProtocol", "24");
    let (patched, changes) = patcher.finish();

    assert_eq!(patched.render(), text);
    assert!(changes.iter().all(|change| !change.is_edit()));
}

#[test]
fn filtered_set_edits_every_selected_block_bottom_up() {
    let document = ConfigDocument::parse(concat!(
        "listener A {\n",
        "  secure 1\n",
        "}\n",
        "listener B {\n",
        "  secure 1\n",
        "  sslProtocol 4\n",
        "}\n",
    ));
    let mut patcher = DocumentPatcher::new(document);
    patcher.set_in_filtered_blocks(&secure_listeners(), "sslProtocol", "24");
    let (patched, changes) = patcher.finish();

    assert_eq!(
        patched.render(),
        concat!(
            "listener A {\n",
            "  secure 1\n",
            "  sslProtocol             24\n",
            "}\n",
            "listener B {\n",
            "  secure 1\n",
            "  sslProtocol 24\n",
            "}\n",
        )
    );
    let fields: Vec<_> = changes.iter().map(ChangeRecord::field).collect();
    assert_eq!(fields, vec!["listener A.sslProtocol", "listener B.sslProtocol"]);
}

#[rstest]
fn strip_touches_only_secure_listener(two_listeners: ConfigDocument) {
    let mut patcher = DocumentPatcher::new(two_listeners);
    patcher.strip_keys_in_filtered_blocks(&secure_listeners(), &["sslCert", "sslKey"]);
    let (patched, changes) = patcher.finish();

    assert_eq!(
        patched.render(),
        concat!(
            "serverName                web\n",
            "listener Default {\n",
            "  address                 *:80\n",
            "  sslCert                 /etc/plain.pem\n",
            "}\n",
            "listener SSL {\n",
            "  address                 *:443\n",
            "  secure                  1\n",
            "}\n",
        )
    );
    let rendered: Vec<_> = changes.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "listener SSL.sslCert => (removed)",
            "listener SSL.sslKey => (removed)",
        ]
    );
}

#[rstest]
fn strip_without_matches_records_nothing(two_listeners: ConfigDocument) {
    let mut patcher = DocumentPatcher::new(two_listeners.clone());
    patcher.strip_keys_in_filtered_blocks(&secure_listeners(), &["ciphers"]);
    let (patched, changes) = patcher.finish();

    assert_eq!(patched, two_listeners);
    assert!(changes.is_empty());
}

// =============================================================================
// Formatting
// =============================================================================

#[rstest]
#[case("", "user", "nobody", "user                      nobody")]
#[case("  ", "maxConnections", "10", "  maxConnections          10")]
#[case("", "aVeryLongDirectiveNameIndeed", "1", "aVeryLongDirectiveNameIndeed 1")]
fn directives_align_values(
    #[case] indent: &str,
    #[case] key: &str,
    #[case] value: &str,
    #[case] expected: &str,
) {
    assert_eq!(format_directive(indent, key, value), expected);
}

#[rstest]
#[case("  logLevel    DEBUG", "WARN", "  logLevel    WARN")]
#[case("\tlogLevel\tDEBUG  ", "WARN", "\tlogLevel\tWARN")]
#[case("logLevel", "WARN", "logLevel WARN")]
fn rewritten_values_keep_layout(#[case] line: &str, #[case] value: &str, #[case] expected: &str) {
    assert_eq!(rewrite_value(line, value), expected);
}
