//! Log output setup
//!
//! `RUST_LOG` takes precedence; otherwise only warnings are shown so the
//! printed report stays readable. `--debug` raises the default to `debug`.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Capture logs in tests; safe to call more than once.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
