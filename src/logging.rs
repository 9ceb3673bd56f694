//! Structured logging setup, replacing the original's `fprintf(stderr, ...)`
//! calls with `tracing` + `tracing-subscriber`, matching the stack used
//! throughout `examples/other_examples/` for service binaries.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter (`info`) per-target, e.g. `RUST_LOG=queen_httpd=debug`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
