//! Log subscriber setup for host processes

use tracing::Level;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy()
}

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to INFO
///
/// Panics if a global subscriber is already set.
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Like [`init`], but leaves an existing global subscriber in place
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}
