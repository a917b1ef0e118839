//! Verification engine configuration with validation.
//!
//! Loaded from TOML, then overridden from `NV_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default deadline for every network check.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Actively configured chain
    pub chain: ChainConfig,
    /// DNS-over-HTTPS resolver
    pub dns: DnsConfig,
    /// Direct challenge-file check
    pub http_file: HttpFileConfig,
    /// TCP port-check
    pub port_check: PortCheckConfig,
    /// Challenge expiry policy
    pub challenge: ChallengePolicy,
}

impl VerificationConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let mut config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        info!(path = %path.display(), chain = %config.chain.name, "Loaded verification config");
        Ok(config)
    }

    /// Apply `NV_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("NV_CHAIN_NAME") {
            self.chain.name = name;
        }
        if let Some(endpoint) = lookup("NV_DOH_ENDPOINT") {
            self.dns.endpoint = endpoint;
        }
        if let Some(port) = lookup("NV_HTTP_FILE_PORT") {
            match port.parse() {
                Ok(p) => self.http_file.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid NV_HTTP_FILE_PORT"),
            }
        }
        if let Some(port) = lookup("NV_PORT_CHECK_PORT") {
            match port.parse() {
                Ok(p) => self.port_check.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid NV_PORT_CHECK_PORT"),
            }
        }
        if let Some(ttl) = lookup("NV_CHALLENGE_TTL") {
            match humantime_serde::re::humantime::parse_duration(&ttl) {
                Ok(d) => self.challenge.ttl = d,
                Err(_) => warn!(value = %ttl, "Ignoring invalid NV_CHALLENGE_TTL"),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.name.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.name cannot be empty".into()));
        }
        if self.chain.address_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "chain.address_prefix cannot be empty".into(),
            ));
        }
        if !self.dns.endpoint.starts_with("http://") && !self.dns.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "dns.endpoint must be an http(s) URL: {}",
                self.dns.endpoint
            )));
        }

        let timeouts = [
            ("dns.timeout", self.dns.timeout),
            ("http_file.timeout", self.http_file.timeout),
            ("port_check.timeout", self.port_check.timeout),
            ("challenge.ttl", self.challenge.ttl),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!("{name} cannot be 0")));
        }

        if self.http_file.port == 0 || self.port_check.port == 0 {
            return Err(ConfigError::Invalid("check ports cannot be 0".into()));
        }
        if self.http_file.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "http_file.max_body_bytes cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Actively configured chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Display name; also builds the default `<name> Signed Message:\n` prefix
    pub name: String,
    /// Ready-made prefix replacing the default one
    pub message_prefix: Option<String>,
    /// Set when `message_prefix` already carries its length byte
    pub message_prefix_length_prefixed: bool,
    /// P2PKH version byte
    pub pub_key_hash_version: u8,
    /// Leading characters of valid addresses
    pub address_prefix: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: "Bitcoin".to_string(),
            message_prefix: None,
            message_prefix_length_prefixed: false,
            pub_key_hash_version: 0x00,
            address_prefix: "1".to_string(),
        }
    }
}

/// DNS-over-HTTPS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// JSON API endpoint (application/dns-json)
    pub endpoint: String,
    /// Per-query deadline
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloudflare-dns.com/dns-query".to_string(),
            timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Direct challenge-file check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpFileConfig {
    /// Port the node serves the challenge file on (default: 8080)
    pub port: u16,
    /// Request deadline
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Largest body read before giving up
    pub max_body_bytes: usize,
}

impl Default for HttpFileConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            timeout: DEFAULT_NETWORK_TIMEOUT,
            max_body_bytes: 4096,
        }
    }
}

/// TCP port-check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortCheckConfig {
    /// Port the node serves the token on (default: 8081)
    pub port: u16,
    /// Connect + read deadline
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PortCheckConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Challenge expiry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengePolicy {
    /// Time from initiation until a pending challenge expires
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for ChallengePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
        }
    }
}
