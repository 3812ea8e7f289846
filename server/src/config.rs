//! # Config
//!
//! Define and implement config options for module

use anyhow::Result;
use config::{ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

/// struct holding configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// path to log configuration YAML file
    pub log_config: String,

    /// allow plain-http USS base URLs; only enable for tests
    pub enable_http: bool,

    /// how often the store re-runs an action on a retryable conflict
    pub transaction_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        log::warn!("(default) Creating Config object with default values.");
        Self::new()
    }
}

impl Config {
    /// Default values for Config
    pub fn new() -> Self {
        Config {
            log_config: String::from("log4rs.yaml"),
            enable_http: false,
            transaction_retries: 3,
        }
    }

    /// Create a new `Config` object using environment variables
    pub fn try_from_env() -> Result<Self, ConfigError> {
        // read .env file if present
        dotenv().ok();
        let default_config = Config::default();

        config::Config::builder()
            .set_default("log_config", default_config.log_config)?
            .set_default("enable_http", default_config.enable_http)?
            .set_default("transaction_retries", default_config.transaction_retries)?
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}
