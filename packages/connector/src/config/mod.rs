//! Configuration module
//!
//! Loads the connector settings and per-environment service URLs from TOML.

pub mod endpoints;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::retry::RetryPolicy;
use crate::connection::websocket::ConnectorBuilder;

pub use endpoints::Endpoints;

pub const ENVIRONMENT_VAR: &str = "MEETVOICE_ENV";

/// Deployment environment selecting the service URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Read the environment from `MEETVOICE_ENV`, defaulting to development
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Development),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("Unknown environment '{}' (expected development or production)", other),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service URLs per environment
    #[serde(default)]
    pub environments: EnvironmentsConfig,

    /// Retry and keep-alive settings
    #[serde(default)]
    pub connector: ConnectorSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Base URLs of the hosted services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUrls {
    /// Text-to-speech and sign-up questions
    pub tts: String,
    /// Conversational AI
    pub ia: String,
    /// Voice conversation
    pub voice: String,
}

impl ServiceUrls {
    pub fn development() -> Self {
        Self {
            tts: "http://localhost:8001".to_string(),
            ia: "http://localhost:8004".to_string(),
            voice: "http://localhost:8010".to_string(),
        }
    }

    pub fn production() -> Self {
        Self {
            tts: "https://aaaazealmmmma.duckdns.org:8001".to_string(),
            ia: "https://aaaazealmmmma.duckdns.org:8004".to_string(),
            voice: "https://aaaazealmmmma.duckdns.org:8010".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentsConfig {
    #[serde(default = "ServiceUrls::development")]
    pub development: ServiceUrls,

    #[serde(default = "ServiceUrls::production")]
    pub production: ServiceUrls,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            development: ServiceUrls::development(),
            production: ServiceUrls::production(),
        }
    }
}

/// Connector retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// Attempts per connect call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds; the wait after attempt k is k units
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Budget for a single attempt in milliseconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    /// Keep-alive ping interval in seconds (0 = disabled)
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_attempt_timeout() -> u64 {
    10_000
}

fn default_keepalive() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            attempt_timeout_ms: default_attempt_timeout(),
            keepalive_secs: default_keepalive(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ConnectorSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.attempt_timeout_ms),
        )
    }

    /// A connector builder for `address` carrying these settings
    pub fn builder(&self, address: &str) -> ConnectorBuilder {
        ConnectorBuilder::new(address)
            .retry_policy(self.retry_policy())
            .keepalive(Some(Duration::from_secs(self.keepalive_secs)))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.connector
            .retry_policy()
            .validate()
            .context("Invalid [connector] section")?;
        Ok(())
    }

    pub fn service_urls(&self, environment: Environment) -> &ServiceUrls {
        match environment {
            Environment::Development => &self.environments.development,
            Environment::Production => &self.environments.production,
        }
    }

    /// Resolve the endpoint table for `environment`
    pub fn endpoints(&self, environment: Environment) -> Result<Endpoints> {
        Endpoints::resolve(environment, self.service_urls(environment))
    }
}
