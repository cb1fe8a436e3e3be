//! Structured logging setup. `RUST_LOG` drives the filter, falling back
//! to `info` so a default run isn't silent.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}
