//! The Managed Server: loads peer config from a mounted file, pings every peer
//! in the cohort on a timer, and hot-reloads the schedule when the file changes.
use std::{path::PathBuf, sync::Arc};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::wire::PeerConfig;

pub mod http;
pub mod ping;
pub mod watch;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/peering/config.json";
pub const DEFAULT_PORT: u16 = 8080;

/// Everything an HTTP handler or the ping scheduler needs to read. `config` is
/// replaced atomically on reload; readers never observe a partially-constructed value.
pub struct ServerState {
    pub server_name: String,
    pub config: Arc<ArcSwap<PeerConfig>>,
}

impl ServerState {
    pub fn new(server_name: String, initial: PeerConfig) -> Self {
        Self {
            server_name,
            config: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }
}

/// Resolves the server's logged identity: `POD_NAME`, falling back to `HOSTNAME`,
/// falling back to a fixed placeholder so the process never fails to start over this.
pub fn server_name() -> String {
    std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_owned())
}

pub fn config_path() -> PathBuf {
    std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())
        .into()
}

pub fn port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Loads and parses `config.json` at `path`. A missing file yields built-in defaults
/// (peers=[], pingInterval=60000ms) rather than an error; the process
/// must keep running with an empty cohort until the operator projects a real one.
pub async fn load_config(path: &std::path::Path) -> PeerConfig {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found yet, using built-in defaults", path.display());
            return PeerConfig::default();
        }
        Err(e) => {
            warn!("failed to read {}: {}, using built-in defaults", path.display(), e);
            return PeerConfig::default();
        }
    };

    match serde_json::from_slice::<PeerConfig>(&bytes) {
        Ok(config) => config,
        Err(e) => {
            warn!("failed to parse {}: {}, retaining prior config", path.display(), e);
            PeerConfig::default()
        }
    }
}

/// Like [`load_config`], but returns `None` on any failure so the caller can retain
/// whatever config is already installed instead of falling back to defaults. Used by
/// the hot-reload path, where "no config yet" doesn't apply -- there's always a prior one.
pub async fn reload_config(path: &std::path::Path) -> Option<PeerConfig> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to read {} on reload: {}, retaining prior config", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice::<PeerConfig>(&bytes) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("failed to parse {} on reload: {}, retaining prior config", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults_not_error() {
        let config = load_config(std::path::Path::new("/nonexistent/config.json")).await;
        assert!(config.peers.is_empty());
        assert_eq!(config.ping_interval, 60_000);
    }

    #[tokio::test]
    async fn malformed_file_retains_defaults_on_initial_load() {
        let dir = std::env::temp_dir().join(format!("peering-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let config = load_config(&path).await;
        assert!(config.peers.is_empty());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn reload_returns_none_on_parse_error_so_caller_keeps_prior() {
        let dir = std::env::temp_dir().join(format!("peering-test-reload-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(&path, b"{broken").await.unwrap();
        assert!(reload_config(&path).await.is_none());
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn reload_parses_valid_replacement_config() {
        let dir = std::env::temp_dir().join(format!("peering-test-reload-ok-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(
            &path,
            br#"{"peers":[{"host":"a","port":1}],"pingInterval":5000}"#,
        )
        .await
        .unwrap();
        let config = reload_config(&path).await.unwrap();
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.ping_interval, 5000);
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
