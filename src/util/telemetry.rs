//! Telemetry helpers for structured logging.

/// Install a default env-filtered `fmt` subscriber unless one is already set.
///
/// Pool events log under this crate's target; `RUST_LOG=prometheus_ftp_master=debug`
/// shows dispatch, handshake and retirement detail. Applications that configure
/// their own subscriber can skip this.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}

/// Like [`init_tracing`] but falls back to `default_directive` when `RUST_LOG`
/// is unset or invalid.
pub fn init_tracing_with_default(default_directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
