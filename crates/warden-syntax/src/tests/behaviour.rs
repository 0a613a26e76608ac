//! Behaviour-driven development (BDD) step definitions for warden-syntax scenarios.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::{
    AttributePattern, BlockFilter, BlockPattern, BlockRange, ConfigDocument, IntegrityValidator,
    StructuralError, ValidationReport,
};

// =============================================================================
// Test World
// =============================================================================

/// State shared across BDD steps.
#[derive(Default)]
struct TestWorld {
    /// Document under test.
    document: Option<ConfigDocument>,
    /// Ranges produced by the last scan.
    ranges: Vec<BlockRange>,
    /// Outcome of the last validation.
    validation: Option<Result<ValidationReport, StructuralError>>,
}

impl TestWorld {
    fn document(&self) -> &ConfigDocument {
        self.document.as_ref().expect("document should be set")
    }
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}

/// Strips surrounding double quotes and expands `\n` escapes.
fn unquote(s: &str) -> String {
    s.trim_matches('"').replace("\\n", "\n")
}

// =============================================================================
// Given Steps
// =============================================================================

#[given("a document {text}")]
fn given_document(world: &RefCell<TestWorld>, text: String) {
    world.borrow_mut().document = Some(ConfigDocument::parse(&unquote(&text)));
}

// =============================================================================
// When Steps
// =============================================================================

#[when("blocks introduced by {keyword} are scanned")]
fn when_scan_keyword(world: &RefCell<TestWorld>, keyword: String) {
    let mut w = world.borrow_mut();
    let filter = BlockFilter::header(BlockPattern::keyword(unquote(&keyword)));
    w.ranges = w.document().scan(&filter).collect();
}

#[when("{keyword} blocks containing {key} {value} are scanned")]
fn when_scan_attribute(world: &RefCell<TestWorld>, keyword: String, key: String, value: String) {
    let mut w = world.borrow_mut();
    let filter = BlockFilter::attribute(AttributePattern::new(unquote(&key), unquote(&value)))
        .within(BlockPattern::keyword(unquote(&keyword)));
    w.ranges = w.document().scan(&filter).collect();
}

#[when("the document is validated with a floor of {bytes} bytes")]
fn when_validate(world: &RefCell<TestWorld>, bytes: usize) {
    let mut w = world.borrow_mut();
    let validator = IntegrityValidator::new(bytes, "listener");
    let outcome = validator.validate(w.document());
    w.validation = Some(outcome);
}

// =============================================================================
// Then Steps
// =============================================================================

#[then("{count} block is found spanning lines {start} to {end}")]
fn then_single_range(world: &RefCell<TestWorld>, count: usize, start: usize, end: usize) {
    let w = world.borrow();
    assert_eq!(w.ranges.len(), count, "ranges: {:?}", w.ranges);
    assert_eq!(w.ranges.first(), Some(&BlockRange::new(start, end)));
}

#[then("no blocks are found")]
fn then_no_ranges(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    assert!(w.ranges.is_empty(), "expected no ranges, got {:?}", w.ranges);
}

#[then("validation passes")]
fn then_validation_passes(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    let outcome = w.validation.as_ref().expect("validation should have run");
    assert!(outcome.is_ok(), "expected pass, got {outcome:?}");
}

#[then("validation passes with a listener warning")]
fn then_validation_warns(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    let outcome = w.validation.as_ref().expect("validation should have run");
    let report = outcome.as_ref().expect("validation should pass");
    assert_eq!(report.warnings().len(), 1);
}

#[then("validation fails with a brace imbalance")]
fn then_validation_imbalance(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    match w.validation.as_ref() {
        Some(Err(StructuralError::BraceImbalance { .. })) => {}
        other => panic!("expected brace imbalance, got {other:?}"),
    }
}

#[then("validation fails as undersized")]
fn then_validation_undersized(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    match w.validation.as_ref() {
        Some(Err(StructuralError::Undersized { .. })) => {}
        other => panic!("expected undersized failure, got {other:?}"),
    }
}

// =============================================================================
// Scenario Bindings
// =============================================================================

#[scenario(path = "tests/features/warden_syntax.feature")]
fn warden_syntax(#[from(world)] _: RefCell<TestWorld>) {}
