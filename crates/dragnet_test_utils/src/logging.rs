//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

const DEFAULT_TEST_FILTER: &str = "dragnet=debug,dragnet_test_utils=debug";

/// Install a fmt subscriber routed through the test harness's captured
/// output. Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
