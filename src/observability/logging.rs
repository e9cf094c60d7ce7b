//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Logs go to stderr so `show` output stays machine readable
//! - `RUST_LOG` applies when no verbosity flag is given

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// - 0: `RUST_LOG`, falling back to warnings and errors
/// - 1: info
/// - 2: debug
/// - 3+: trace
pub fn init(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("sgxlkl_config=info"),
        2 => EnvFilter::new("sgxlkl_config=debug"),
        _ => EnvFilter::new("trace"),
    };

    // A subscriber may already be installed by the embedding process.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
