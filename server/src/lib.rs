#![doc = include_str!("../README.md")]

#[macro_use]
pub mod macros;

#[cfg(test)]
pub mod test_util;

mod config;
pub use crate::config::Config;

pub mod api;
pub mod auth;
pub mod errors;
pub mod models;
pub mod repos;
pub mod store;

use std::sync::Once;
static INIT_LOGGER: Once = Once::new();
/// Initialize the logger with provided configuration
pub fn init_logger(config: &Config) {
    INIT_LOGGER.call_once(|| {
        let log_cfg: &str = config.log_config.as_str();
        if let Err(e) = log4rs::init_file(log_cfg, Default::default()) {
            panic!(
                "(logger) could not parse log config {} found in config {:?}: {}.",
                log_cfg, config, e
            );
        }
    });
}
