//! Gateway configuration: shipgate.toml plus environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the Nomad HTTP API, without the `/v1` suffix.
    pub nomad_url: String,
    pub nomad_token: Option<String>,
    /// Accept any certificate from Nomad. Only for private networks.
    pub skip_tls_verify: bool,
    /// Shared secret expected in the `X-Secret-Key` header.
    pub secret_key: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Written into job `Meta` as `updated_by`.
    pub identity: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            nomad_url: "http://127.0.0.1:4646".to_string(),
            nomad_token: None,
            skip_tls_verify: false,
            secret_key: String::new(),
            port: 8080,
            data_dir: PathBuf::from("/var/lib/shipgate"),
            identity: "shipgate".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Overlay values from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("NOMAD_URL") {
            self.nomad_url = url;
        }
        if let Some(token) = get("NOMAD_TOKEN") {
            self.nomad_token = Some(token);
        }
        if let Some(raw) = get("SKIP_TLS_VERIFY") {
            self.skip_tls_verify = parse_bool(&raw).ok_or(ConfigError::InvalidEnv {
                key: "SKIP_TLS_VERIFY",
                value: raw,
            })?;
        }
        if let Some(secret) = get("RPC_SECRET") {
            self.secret_key = secret;
        }
        if let Some(raw) = get("PORT") {
            self.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT",
                value: raw,
            })?;
        }
        if let Some(dir) = get("SHIPGATE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(identity) = get("SHIPGATE_IDENTITY") {
            self.identity = identity;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Invalid(
                "secret_key must be set (RPC_SECRET)".to_string(),
            ));
        }
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Invalid("identity must not be empty".to_string()));
        }
        if !self.nomad_url.starts_with("http://") && !self.nomad_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "nomad_url must be an http(s) URL, got {:?}",
                self.nomad_url
            )));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("shipgate.redb")
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
