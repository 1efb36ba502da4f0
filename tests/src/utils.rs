//! Shared setup for deployment tests

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

/// Guards the one-time logging setup
static TRACING_INIT: Once = Once::new();

/// Set up logging for a test, filtered by `RUST_LOG`
pub fn global_setup() {
    TRACING_INIT.call_once(|| {
        fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}
