use serde::Deserialize;

fn default_listen() -> String {
    "0.0.0.0:17900".to_string()
}

fn default_keep_window() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

/// `[server]` (§6). `listen` is kept as a string rather than `SocketAddr` so
/// a malformed address is a validation error with a clear message instead of
/// a raw `serde`/`toml` parse failure.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// `expectedProxies` in `original_source/configuration.h`; advisory only
    /// (no validation depends on the count matching).
    #[serde(default)]
    pub expected_proxies: u8,
    /// `defaultKeepWindow`; rejected at config time if it exceeds 65535
    /// seconds (§8 boundary behavior).
    #[serde(default = "default_keep_window")]
    pub default_keep_window_secs: u32,
    /// `syncAfterConnEstablished`: whether the handler immediately asks a
    /// freshly (re)connected proxy to resync.
    #[serde(default = "default_true")]
    pub sync_after_conn_established: bool,
    /// The server's own AS number, used as `localAS` in BGPsec validation
    /// and as `prevASN`/`currentASN` context for transitive signing.
    /// Ambient addition: spec.md names `localAS` as a validator input
    /// (§4.9) but does not say where the server learns it.
    #[serde(default)]
    pub local_asn: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: default_listen(),
            expected_proxies: 0,
            default_keep_window_secs: default_keep_window(),
            sync_after_conn_established: true,
            local_asn: 0,
        }
    }
}
