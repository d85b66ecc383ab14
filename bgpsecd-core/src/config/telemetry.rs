use serde::Deserialize;

fn default_log_level() -> String {
    "info".to_string()
}

/// `[logging]` (§6), shaped after `huginn-proxy-lib/src/config/telemetry.rs`'s
/// `LoggingConfig`.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            target: false,
        }
    }
}
