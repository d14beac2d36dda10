//! Tracing bootstrap for embedding hosts and tests.

use tracing_subscriber::EnvFilter;

use crate::core::observe::ALERT_TARGET;

/// Filter applied when `RUST_LOG` is unset: scheduler events at info, and
/// the critical-alert target always audible.
fn default_filter() -> EnvFilter {
    EnvFilter::new(format!("transfer_scheduler=info,{ALERT_TARGET}=error"))
}

/// Initialize tracing for hosts that do not install their own subscriber.
///
/// Honors `RUST_LOG` when set, otherwise falls back to a filter that keeps
/// scheduler events at info and critical alerts audible. A no-op when a
/// subscriber is already installed, so callers (tests included) may invoke
/// it unconditionally.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
