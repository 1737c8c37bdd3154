//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter directive for the crate's own events.
pub fn default_directive(print_debug: bool) -> &'static str {
    if print_debug { "debug" } else { "info" }
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init(print_debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(print_debug)));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
