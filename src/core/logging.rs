// Log output for binaries embedding the practice pipeline

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "asana=info,asana_lib=info";

/// Install a fmt subscriber honoring `RUST_LOG`
///
/// Returns false if a global subscriber was already set.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
