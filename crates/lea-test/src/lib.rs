//! lea-test - Test synthesis for lea
//!
//! Expands each inline assertion of a regular script into a synthetic
//! test script whose SQL returns the violating rows of the parent's
//! audit table. A test passes iff its query returns zero rows.

pub mod synthesize;

pub use synthesize::{synthesize_assertion_tests, test_table_ref};
