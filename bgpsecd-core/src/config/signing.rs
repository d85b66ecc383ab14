use serde::Deserialize;

/// `[signing]` (§4.10, §6). When `private_key_path` is absent the server
/// still runs — it just cannot answer `SIGTRA_GENERATION_REQUEST` — matching
/// the "signing failure: do not send a response for that peer, log" row of
/// §7 rather than refusing to start.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SigningConfig {
    #[serde(default)]
    pub private_key_path: Option<String>,
}
