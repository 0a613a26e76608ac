//! Test suites shared across the engine.

pub(crate) mod support;
