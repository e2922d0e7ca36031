#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests. Test doubles live in `ideasieve-test-utils`.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}
