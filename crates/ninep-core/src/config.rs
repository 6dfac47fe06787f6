//! Engine configuration (A3).
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $NINEP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ninep/config.toml
//!   3. ~/.config/ninep/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine-wide tunables shared by both the server and client connection
/// builders. Immutable once a connection is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum single-message length, in bytes.
    pub msize: u32,
    /// Protocol version string offered during handshake.
    pub version: String,
    /// How long the handshake (`Tversion`/`Tattach` round trip) may
    /// take before the caller's own timeout wrapper should give up.
    /// The engine itself does not enforce this — see §5 of the design
    /// notes on timeouts being the caller's concern.
    #[serde(rename = "handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Whether per-transaction `tag`/`fid` fields are attached to
    /// tracing spans as structured fields.
    pub log_span_tags: bool,
}

impl EngineConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            msize: 8192,
            version: "9P2000".to_string(),
            handshake_timeout_secs: 5,
            log_span_tags: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("ninep")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

impl EngineConfig {
    /// Resolve a config file path, a `NINEP_CONFIG` override taking
    /// priority over the XDG default.
    pub fn file_path() -> PathBuf {
        std::env::var("NINEP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Load config: env vars → file → defaults. A missing file is not
    /// an error; a present-but-unparseable file is.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            EngineConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NINEP_MSIZE") {
            if let Ok(v) = v.parse() {
                self.msize = v;
            }
        }
        if let Ok(v) = std::env::var("NINEP_VERSION") {
            self.version = v;
        }
        if let Ok(v) = std::env::var("NINEP_HANDSHAKE_TIMEOUT_SECS") {
            if let Ok(v) = v.parse() {
                self.handshake_timeout_secs = v;
            }
        }
        if let Ok(v) = std::env::var("NINEP_LOG_SPAN_TAGS") {
            self.log_span_tags = v == "true" || v == "1";
        }
    }
}
