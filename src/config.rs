use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Process configuration, loaded from a JSON file with defaults for every
/// field. A missing file yields the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub listen: ListenConfig,
    pub local: LocalConfig,
    pub service: Option<ServiceConfig>,
    pub correlation: CorrelationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub port: u16,
    pub bind: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            port: 9300,
            bind: "0.0.0.0".to_string(),
        }
    }
}

/// Authentication controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub db: DbConfig,
    pub algorithm: String,
    /// Maximum clock drift, in milliseconds, between the server's time and
    /// a request's Date header
    pub skew: i64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            db: DbConfig::default(),
            algorithm: "SHA256".to_string(),
            skew: 5000,
        }
    }
}

/// Key store settings. `path` selects the variant: an `http(s)` URL loads
/// remotely, anything else reads a local file; `propsd` switches the remote
/// load to prefix-filtered property-set semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub path: String,
    /// OS signal that triggers a key reload without a restart
    pub signal: String,
    pub propsd: bool,
    pub prefix: String,
    pub delimiter: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            path: "data/keys.json".to_string(),
            signal: "SIGHUP".to_string(),
            propsd: false,
            prefix: String::new(),
            delimiter: String::new(),
        }
    }
}

/// The upstream service authenticated requests are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub hostname: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            port: 9301,
            hostname: "localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Header used to pass correlation identifiers between services
    pub header: String,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            header: "X-Request-Identifier".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        serde_json::from_str(&raw).context("parsing JSON")
    }

    /// Default configuration includes an upstream; tests and bespoke
    /// deployments may set `"service": null` to disable forwarding.
    pub fn with_defaults() -> Self {
        Config {
            service: Some(ServiceConfig::default()),
            ..Config::default()
        }
    }
}
