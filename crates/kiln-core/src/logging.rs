//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter used by [`init`].
pub const DEFAULT_FILTER: &str = "info,kiln_core=debug,kiln_assets=debug";

/// Install a fmt subscriber with [`DEFAULT_FILTER`], overridable through
/// `RUST_LOG`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Install a fmt subscriber with an explicit filter directive.
pub fn init_with_filter(filter: &str) {
    install(EnvFilter::new(filter));
}

fn install(filter: EnvFilter) {
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already installed");
    }
}
