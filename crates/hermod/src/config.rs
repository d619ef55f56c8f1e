// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Master server configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::Url;

/// Service directory (master) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Listen URL (default: tcp://0.0.0.0:5555)
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Event loop worker threads (0 = hardware concurrency)
    #[serde(default)]
    pub worker_threads: usize,

    /// Maximum wire message size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Housekeeping/statistics report period in seconds
    #[serde(default = "default_stats_period")]
    pub stats_period_secs: u64,

    /// Enable TLS on accepted TCP connections
    #[serde(default)]
    pub tls_enabled: bool,

    /// TLS certificate chain file (PEM)
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// TLS private key file (PEM)
    #[serde(default)]
    pub tls_key_path: Option<String>,
}

fn default_listen_address() -> String {
    "tcp://0.0.0.0:5555".to_string()
}

fn default_max_message_size() -> usize {
    16 * 1024 * 1024 // 16 MB
}

fn default_stats_period() -> u64 {
    20
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            worker_threads: 0,
            max_message_size: default_max_message_size(),
            stats_period_secs: default_stats_period(),
            tls_enabled: false,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl MasterConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Parsed listen URL.
    pub fn listen_url(&self) -> Result<Url, ConfigError> {
        self.listen_address
            .parse()
            .map_err(|e: crate::transport::UrlError| ConfigError::InvalidValue(e.to_string()))
    }

    /// Statistics period as a `Duration`.
    #[must_use]
    pub fn stats_period(&self) -> Duration {
        Duration::from_secs(self.stats_period_secs)
    }

    /// Validate field combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_url()?;
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_message_size cannot be 0".into(),
            ));
        }
        if self.stats_period_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "stats_period_secs cannot be 0".into(),
            ));
        }
        if self.tls_enabled {
            if self.tls_cert_path.is_none() {
                return Err(ConfigError::InvalidValue(
                    "tls_cert_path required when TLS enabled".into(),
                ));
            }
            if self.tls_key_path.is_none() {
                return Err(ConfigError::InvalidValue(
                    "tls_key_path required when TLS enabled".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
