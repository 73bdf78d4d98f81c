//! CLI Configuration
//!
//! Locates and loads ~/.meetvoice/config.toml and resolves the endpoint
//! table once for the selected environment.

use anyhow::{Context, Result};
use meetvoice_connector::{Config, Endpoints, Environment};
use std::path::{Path, PathBuf};

/// Everything a command needs, resolved at startup
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub environment: Environment,
    pub endpoints: Endpoints,
}

impl AppContext {
    pub fn load(config_path: Option<PathBuf>, environment: Option<Environment>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_path()?,
        };
        let config = Config::load_or_default(&config_path)?;

        let environment = match environment {
            Some(env) => env,
            None => Environment::from_env()?,
        };

        let endpoints = config
            .endpoints(environment)
            .with_context(|| format!("Invalid service URLs for {}", environment))?;

        Ok(Self {
            config,
            config_path,
            environment,
            endpoints,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Get the config file path (~/.meetvoice/config.toml)
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".meetvoice").join("config.toml"))
}
