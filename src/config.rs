// ---------------------
// --- CONFIGURATION ---
// ---------------------

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env::var;
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_MAX_CLIENTS: usize = 5;
pub const DEFAULT_QUEUE_DEPTH: i32 = 32;

/// Settings are read once at startup and are fixed for the life of a
/// running instance; a SIGHUP reload re-reads the sources, but the
/// listener is already bound and the slot table already sized, so changed
/// values only take effect on restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpdConfig {
    /// Listening port (1-65535).
    pub port: u16,
    /// Slot capacity: maximum concurrently open client connections (1-65535).
    pub max_clients: usize,
    /// Accept backlog depth passed to listen() (1-128).
    pub queue_depth: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(u16),
    #[error("max_clients must be between 1 and 65535, got {0}")]
    MaxClientsOutOfRange(usize),
    #[error("queue_depth must be between 1 and 128, got {0}")]
    QueueDepthOutOfRange(i32),
}

impl HttpdConfig {
    pub fn new(port: u16, max_clients: usize, queue_depth: i32) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }
        if max_clients == 0 || max_clients > 65535 {
            return Err(ConfigError::MaxClientsOutOfRange(max_clients));
        }
        if queue_depth < 1 || queue_depth > 128 {
            return Err(ConfigError::QueueDepthOutOfRange(queue_depth));
        }

        Ok(Self {
            port,
            max_clients,
            queue_depth,
        })
    }

    /// Stable digest of the effective settings, used by the start
    /// preflight to recognize "already running with the same config".
    pub fn hash(&self) -> String {
        let input = format!("{}:{}:{}", self.port, self.max_clients, self.queue_depth);
        hex::encode(Sha256::digest(input.as_bytes()))
    }
}

impl Default for HttpdConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// File form of the settings. Absent fields fall through to the
/// environment, then to the defaults.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    port: Option<u16>,
    max_clients: Option<usize>,
    queue_depth: Option<i32>,
}

/// Read the effective configuration.
///
/// Precedence per field: JSON file named by $HELLOD_CONFIG (if set), then
/// the HELLOD_PORT / HELLOD_MAX_CLIENTS / HELLOD_QUEUE_DEPTH environment
/// variables, then the defaults. Out-of-range or non-integer values are
/// errors, not silently clamped.
pub fn load() -> Result<HttpdConfig> {
    let overrides = match var("HELLOD_CONFIG") {
        Ok(path) => read_overrides(Path::new(&path))?,
        Err(_) => FileOverrides::default(),
    };

    let port = match overrides.port {
        Some(port) => port,
        None => env_int("HELLOD_PORT")?.unwrap_or(DEFAULT_PORT),
    };
    let max_clients = match overrides.max_clients {
        Some(max) => max,
        None => env_int("HELLOD_MAX_CLIENTS")?.unwrap_or(DEFAULT_MAX_CLIENTS),
    };
    let queue_depth = match overrides.queue_depth {
        Some(depth) => depth,
        None => env_int("HELLOD_QUEUE_DEPTH")?.unwrap_or(DEFAULT_QUEUE_DEPTH),
    };

    Ok(HttpdConfig::new(port, max_clients, queue_depth)?)
}

fn read_overrides(path: &Path) -> Result<FileOverrides> {
    let raw = read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn env_int<T: FromStr>(key: &str) -> Result<Option<T>> {
    match var(key) {
        Err(_) => Ok(None),
        Ok(raw) => parse_int(key, &raw).map(Some),
    }
}

fn parse_int<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("${key} must be an integer, got {raw:?}"))
}

// -------------
// --- TESTS ---
// -------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{remove_file, write};
    use std::process;

    #[test]
    fn test_defaults() {
        let config = HttpdConfig::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.max_clients, 5);
        assert_eq!(config.queue_depth, 32);
        HttpdConfig::new(config.port, config.max_clients, config.queue_depth)
            .expect("defaults must validate");
    }

    #[test]
    fn test_range_validation() {
        assert_eq!(
            HttpdConfig::new(0, 5, 32),
            Err(ConfigError::PortOutOfRange(0))
        );
        assert_eq!(
            HttpdConfig::new(8888, 0, 32),
            Err(ConfigError::MaxClientsOutOfRange(0))
        );
        assert_eq!(
            HttpdConfig::new(8888, 70000, 32),
            Err(ConfigError::MaxClientsOutOfRange(70000))
        );
        assert_eq!(
            HttpdConfig::new(8888, 5, 0),
            Err(ConfigError::QueueDepthOutOfRange(0))
        );
        assert_eq!(
            HttpdConfig::new(8888, 5, 129),
            Err(ConfigError::QueueDepthOutOfRange(129))
        );

        assert!(HttpdConfig::new(1, 1, 1).is_ok());
        assert!(HttpdConfig::new(65535, 65535, 128).is_ok());
    }

    #[test]
    fn test_parse_int_rejects_garbage() {
        assert_eq!(parse_int::<u16>("HELLOD_PORT", " 9000 ").unwrap(), 9000);
        assert!(parse_int::<u16>("HELLOD_PORT", "not-a-port").is_err());
        assert!(parse_int::<u16>("HELLOD_PORT", "99999").is_err());
    }

    #[test]
    fn test_file_overrides() {
        let path = std::env::temp_dir().join(format!("hellod-config-{}.json", process::id()));
        write(&path, r#"{"port": 9090, "max_clients": 3}"#).expect("write config file");

        let overrides = read_overrides(&path).expect("read overrides");
        assert_eq!(overrides.port, Some(9090));
        assert_eq!(overrides.max_clients, Some(3));
        assert_eq!(overrides.queue_depth, None);

        remove_file(&path).ok();
    }

    #[test]
    fn test_file_overrides_reject_malformed() {
        let path = std::env::temp_dir().join(format!("hellod-bad-config-{}.json", process::id()));
        write(&path, "{not json").expect("write config file");

        assert!(read_overrides(&path).is_err());
        assert!(read_overrides(Path::new("/nonexistent/hellod.json")).is_err());

        remove_file(&path).ok();
    }

    #[test]
    fn test_hash_tracks_settings() {
        let a = HttpdConfig::default();
        let b = HttpdConfig::default();
        assert_eq!(a.hash(), b.hash());

        let c = HttpdConfig::new(9090, 5, 32).expect("valid config");
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a.hash().len(), 64);
    }
}
