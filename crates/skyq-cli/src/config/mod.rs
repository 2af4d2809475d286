//! Application configuration module.
//!
//! Manages the TOML config file holding the box address and EPG feed
//! settings.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, BoxConfig, EpgConfig};
pub use paths::{resolve_cache_dir, resolve_config_path};
