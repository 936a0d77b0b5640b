//! Shared test utilities for gamevault integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - `ConfigBuilder` for creating test configurations programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
