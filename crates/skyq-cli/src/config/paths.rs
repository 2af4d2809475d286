//! Config directory resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use skyq_api::constants::DEFAULT_EPG_CACHE_DIR;

/// Resolves the config file path.
///
/// - If `dir` is `Some`, returns `{dir}/config.toml`.
/// - Otherwise returns `~/.config/skyq/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined (when `dir` is `None`).
pub fn resolve_config_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join("config.toml"));
    }

    let home = std::env::var("HOME").context("HOME environment variable is not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("skyq")
        .join("config.toml"))
}

/// Resolves the XMLTV cache directory.
///
/// A configured absolute path is used as is; a relative one is taken from
/// `dir` when given. Without a configured path, `{dir}/.epg_data` is used, or
/// `None` to leave the client default in place.
pub fn resolve_cache_dir(dir: Option<&PathBuf>, configured: Option<&Path>) -> Option<PathBuf> {
    match (configured, dir) {
        (Some(path), Some(d)) if path.is_relative() => Some(d.join(path)),
        (Some(path), _) => Some(path.to_path_buf()),
        (None, Some(d)) => Some(d.join(DEFAULT_EPG_CACHE_DIR)),
        (None, None) => None,
    }
}
