//! TOML configuration loading (§6 "Configuration"). Grounded on
//! `huginn-proxy-lib/src/config/{root,loader}.rs`'s shape: a plain `serde`
//! struct per concern, assembled into one `Config`, loaded and validated by
//! a single `load_from_path`.

mod loader;
mod queues;
mod server;
mod signing;
mod telemetry;

pub use loader::{load_from_path, proxy_mapping_pairs};
pub use queues::QueueConfig;
pub use server::ServerConfig;
pub use signing::SigningConfig;
pub use telemetry::LoggingConfig;

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level configuration, assembled from the `[server]`, `[queues]`,
/// `[proxy_mappings]`, `[signing]` and `[logging]` tables (§6).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    /// `slot (1..=255) → pre-configured proxyID`. TOML keys are strings;
    /// [`loader::validate`] parses and range-checks them into
    /// `u8` slots, matching `original_source/configuration.c`'s
    /// `configureProxyMap` table.
    #[serde(default)]
    pub proxy_mappings: HashMap<String, u32>,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
