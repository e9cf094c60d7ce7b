//! Configuration metrics.
//!
//! # Metrics
//! - `config_resolutions_total` (counter): boot-time resolutions by outcome
//! - `config_remote_updates_total` (counter): remote batches by outcome
//!
//! Without an installed recorder these are no-ops.

pub const RESOLUTIONS_TOTAL: &str = "config_resolutions_total";
pub const REMOTE_UPDATES_TOTAL: &str = "config_remote_updates_total";

pub fn record_resolution(ok: bool) {
    let outcome = if ok { "ok" } else { "rejected" };
    metrics::counter!(RESOLUTIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_remote_update(applied: bool) {
    let outcome = if applied { "applied" } else { "rejected" };
    metrics::counter!(REMOTE_UPDATES_TOTAL, "outcome" => outcome).increment(1);
}
