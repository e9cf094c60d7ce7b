//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config subsystem produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (resolution and remote update counters)
//! ```
//!
//! # Design Decisions
//! - Option values flagged sensitive never reach a log line
//! - Metrics go through the `metrics` facade; the embedder installs a recorder

pub mod logging;
pub mod metrics;
