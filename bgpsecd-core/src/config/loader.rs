use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::Config;
use crate::error::{CoreError, Result};

/// Loads and validates a TOML config file, following
/// `huginn-proxy-lib/src/config/loader.rs`'s `load_from_path` shape:
/// read → parse → validate, one `CoreError::Config` on any failure.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let text = fs::read_to_string(path.as_ref())
        .map_err(|e| CoreError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&text)
        .map_err(|e| CoreError::Config(format!("failed to parse config: {e}")))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// §8 boundary behavior: "`keep-window` > 65535 is rejected at config time."
/// Slot range and listen-address shape are validated the same way.
fn validate(cfg: &Config) -> Result<()> {
    if cfg.server.default_keep_window_secs > 65535 {
        return Err(CoreError::Config(format!(
            "default_keep_window_secs {} exceeds the 65535s wire limit",
            cfg.server.default_keep_window_secs
        )));
    }

    cfg.server
        .listen
        .parse::<SocketAddr>()
        .map_err(|e| CoreError::Config(format!("invalid server.listen address: {e}")))?;

    for (slot, proxy_id) in &cfg.proxy_mappings {
        let slot: u8 = slot.parse().map_err(|_| {
            CoreError::Config(format!("proxy_mappings key {slot:?} is not a valid slot number"))
        })?;
        if slot == 0 {
            return Err(CoreError::Config(
                "proxy_mappings cannot pre-configure slot 0 (reserved)".to_string(),
            ));
        }
        if *proxy_id == 0 {
            return Err(CoreError::Config(format!(
                "proxy_mappings slot {slot} has proxyID 0, which means \"unused\""
            )));
        }
    }

    if let Some(key_path) = &cfg.signing.private_key_path {
        if !Path::new(key_path).exists() {
            return Err(CoreError::Config(format!(
                "signing.private_key_path {key_path:?} does not exist"
            )));
        }
    }

    Ok(())
}

/// Parses the validated `proxy_mappings` table into `(slot, proxyID)` pairs,
/// ready to feed to [`crate::proxy_map::ProxyMap::add_mapping`].
pub fn proxy_mapping_pairs(cfg: &Config) -> Vec<(u8, u32)> {
    cfg.proxy_mappings
        .iter()
        .filter_map(|(slot, proxy_id)| slot.parse::<u8>().ok().map(|slot| (slot, *proxy_id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let file = write_config("");
        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.server.listen, "0.0.0.0:17900");
        assert_eq!(cfg.server.default_keep_window_secs, 30);
    }

    #[test]
    fn keep_window_over_65535_is_rejected() {
        let file = write_config(
            r#"
            [server]
            default_keep_window_secs = 70000
            "#,
        );
        assert!(matches!(load_from_path(file.path()), Err(CoreError::Config(_))));
    }

    #[test]
    fn proxy_mapping_to_slot_zero_is_rejected() {
        let file = write_config(
            r#"
            [proxy_mappings]
            0 = 42
            "#,
        );
        assert!(matches!(load_from_path(file.path()), Err(CoreError::Config(_))));
    }

    #[test]
    fn proxy_mappings_parse_into_slot_id_pairs() {
        let file = write_config(
            r#"
            [proxy_mappings]
            1 = 168496141
            "#,
        );
        let cfg = load_from_path(file.path()).unwrap();
        let pairs = proxy_mapping_pairs(&cfg);
        assert_eq!(pairs, vec![(1u8, 168496141u32)]);
    }

    #[test]
    fn missing_signing_key_is_rejected() {
        let file = write_config(
            r#"
            [signing]
            private_key_path = "/nonexistent/key.pem"
            "#,
        );
        assert!(matches!(load_from_path(file.path()), Err(CoreError::Config(_))));
    }
}
