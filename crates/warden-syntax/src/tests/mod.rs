//! Test suites for warden-syntax.

mod behaviour;
