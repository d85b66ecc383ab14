use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber from `[logging]`, matching
/// `huginn-proxy/src/main.rs`'s `init_tracing`: an `EnvFilter` seeded from
/// config but overridable via `RUST_LOG`, `fmt` output, optional module
/// targets.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.target)
        .init();
}
