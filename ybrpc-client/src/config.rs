//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via YBRPC_CONFIG or --config)
//! 3. Environment variables

use crate::connection::{ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RPC_TIMEOUT};
use crate::leader::{DiscoveryConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_DISCOVERY_DEADLINE};
use crate::tls::TlsClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use ybrpc_protocol::DEFAULT_MASTER_PORT;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "YBRPC_CONFIG";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Master addresses. Entries without a port use the default master port.
    pub masters: Vec<String>,
    /// Timeout advertised in every request header, in milliseconds.
    pub rpc_timeout_ms: u64,
    /// Also enforce the RPC timeout locally.
    pub enforce_deadline: bool,
    /// Transport connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Overall leader discovery deadline, in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Bound on a single discovery candidate, in milliseconds.
    pub attempt_timeout_ms: u64,
    /// TLS configuration.
    pub tls: TlsClientConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            masters: vec![format!("127.0.0.1:{}", DEFAULT_MASTER_PORT)],
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT.as_millis() as u64,
            enforce_deadline: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            discovery_timeout_ms: DEFAULT_DISCOVERY_DEADLINE.as_millis() as u64,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64,
            tls: TlsClientConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the file named by `YBRPC_CONFIG` (if set),
    /// then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Unparseable numbers are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(masters) = lookup("YBRPC_MASTERS") {
            let parsed: Vec<String> = masters
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.masters = parsed;
            }
        }

        let millis = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(ms) = millis("YBRPC_RPC_TIMEOUT_MS") {
            self.rpc_timeout_ms = ms;
        }
        if let Some(ms) = millis("YBRPC_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = millis("YBRPC_DISCOVERY_TIMEOUT_MS") {
            self.discovery_timeout_ms = ms;
        }

        if let Some(tls) = lookup("YBRPC_TLS") {
            self.tls.enabled = tls == "1" || tls.eq_ignore_ascii_case("true");
        }
        if let Some(path) = lookup("YBRPC_CA_CERT") {
            self.tls.ca_cert_path = Some(PathBuf::from(path));
            self.tls.enabled = true;
        }
        if let Some(path) = lookup("YBRPC_CLIENT_CERT") {
            self.tls.client_cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("YBRPC_CLIENT_KEY") {
            self.tls.client_key_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.masters.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one master address is required".to_string(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "rpc_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.tls.client_cert_path.is_some() != self.tls.client_key_path.is_some() {
            return Err(ConfigError::ValidationError(
                "client certificate and key must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// Master addresses with the default port filled in.
    pub fn master_addrs(&self) -> Vec<String> {
        self.masters.iter().map(|m| with_default_port(m)).collect()
    }

    /// Connection settings shared by every node this client dials. The
    /// address is a placeholder; discovery and direct dials replace it.
    pub fn connection_config(&self) -> ConnectionConfig {
        let first = self.master_addrs().into_iter().next().unwrap_or_default();
        let mut config = ConnectionConfig::new(first)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_rpc_timeout(Duration::from_millis(self.rpc_timeout_ms));
        if self.enforce_deadline {
            config = config.with_enforced_deadline();
        }
        if self.tls.enabled {
            config = config.with_tls(self.tls.clone());
        }
        config
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::new(self.master_addrs())
            .with_deadline(Duration::from_millis(self.discovery_timeout_ms))
            .with_attempt_timeout(Duration::from_millis(self.attempt_timeout_ms))
    }
}

/// Appends the default master port to `addr` when it has none.
pub fn with_default_port(addr: &str) -> String {
    let has_port = if let Some(rest) = addr.strip_prefix('[') {
        // [v6]:port
        rest.contains("]:")
    } else {
        // A bare IPv6 address has several colons and no port.
        addr.matches(':').count() == 1
    };
    if has_port {
        addr.to_string()
    } else if addr.contains(':') && !addr.starts_with('[') {
        format!("[{}]:{}", addr, DEFAULT_MASTER_PORT)
    } else {
        format!("{}:{}", addr, DEFAULT_MASTER_PORT)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}
