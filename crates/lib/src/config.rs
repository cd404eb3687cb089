//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.pbcast/config.json`). A missing
//! file means defaults; CLI flags override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP + WebSocket server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Subscriber delivery settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Gateway bind, port and request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP and WebSocket (default 7070).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Largest accepted ingress body; larger requests get 413 (default 256 KiB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Delivery timeout, eviction threshold and WebSocket session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    /// Consecutive delivery failures after which a subscriber is dropped (default 3).
    #[serde(default = "default_evict_after_failures")]
    pub evict_after_failures: u32,

    /// Per-subscriber delivery timeout in milliseconds (default 5000).
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Outbound frames buffered per WebSocket session (default 64).
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,

    /// Interval between server pings (default 10).
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// A session with no inbound frame for this long is closed (default 30).
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    7070
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_max_body_bytes() -> usize {
    256 * 1024
}

fn default_evict_after_failures() -> u32 {
    3
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

fn default_subscriber_queue() -> usize {
    64
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_client_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            evict_after_failures: default_evict_after_failures(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            subscriber_queue: default_subscriber_queue(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            client_timeout_secs: default_client_timeout_secs(),
        }
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PBCAST_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".pbcast").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or PBCAST_CONFIG_PATH).
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write the default config to `config_path` unless a file already exists there.
/// Returns true when a file was written.
pub fn init_config_file(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
        return Ok(false);
    }
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;
    let body = serde_json::to_string_pretty(&Config::default())
        .context("serializing default config")?;
    std::fs::write(config_path, body)
        .with_context(|| format!("writing default config to {}", config_path.display()))?;
    log::info!("created default config at {}", config_path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 7070);
        assert_eq!(g.bind, "127.0.0.1");
        assert_eq!(g.max_body_bytes, 262144);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"gateway":{"port":9000},"broadcast":{"evictAfterFailures":5}}"#)
                .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, "127.0.0.1");
        assert_eq!(config.broadcast.evict_after_failures, 5);
        assert_eq!(config.broadcast.delivery_timeout_ms, 5000);
        assert_eq!(config.broadcast.heartbeat_interval_secs, 10);
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }

    #[test]
    fn missing_file_loads_defaults_and_init_writes_one() {
        let dir = std::env::temp_dir().join(format!("pbcast-config-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 7070);

        assert!(init_config_file(&path).unwrap());
        assert!(!init_config_file(&path).unwrap());
        let (config, _) = load_config(Some(path.clone())).unwrap();
        assert_eq!(config.broadcast.subscriber_queue, 64);

        let _ = std::fs::remove_dir_all(dir);
    }
}
