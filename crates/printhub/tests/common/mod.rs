//! Shared test utilities for printhub integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Builders for file entries and `fileRanges` payloads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
