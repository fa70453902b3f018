//! Configuration file loading and value resolution
//!
//! Values resolve with priority: command line → environment variable →
//! TOML config file → compiled default. Services hand this module their
//! per-key lookups; the typed config structs live with each service.

use crate::{Error, Result};
use std::path::PathBuf;

/// Locate the TOML config file for a service.
///
/// Checks `~/.config/aural/<service>.toml`, then `/etc/aural/<service>.toml`
/// on Unix. Returns `None` when neither exists (services fall back to env
/// vars and compiled defaults).
pub fn config_file_path(service: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service);

    if let Some(dir) = dirs::config_dir() {
        let user_config = dir.join("aural").join(&file_name);
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/aural").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load the raw TOML table for a service, or an empty table when no config
/// file exists.
pub fn load_config_table(service: &str) -> Result<toml::Table> {
    let Some(path) = config_file_path(service) else {
        return Ok(toml::Table::new());
    };

    let contents = std::fs::read_to_string(&path)?;
    let table: toml::Table = toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), "Loaded config file");
    Ok(table)
}

/// Resolve a string-valued setting with env → TOML → default priority.
pub fn resolve_string(env_var: &str, table: &toml::Table, key: &str, default: &str) -> String {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return value;
        }
    }

    if let Some(value) = table.get(key).and_then(|v| v.as_str()) {
        return value.to_string();
    }

    default.to_string()
}

/// Resolve an optional string-valued setting (no compiled default).
pub fn resolve_opt_string(env_var: &str, table: &toml::Table, key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }

    table
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Resolve an integer-valued setting with env → TOML → default priority.
pub fn resolve_i64(env_var: &str, table: &toml::Table, key: &str, default: i64) -> i64 {
    if let Ok(value) = std::env::var(env_var) {
        if let Ok(parsed) = value.trim().parse::<i64>() {
            return parsed;
        }
        tracing::warn!(env_var, value = %value, "Ignoring non-integer environment override");
    }

    table.get(key).and_then(|v| v.as_integer()).unwrap_or(default)
}

/// Resolve a float-valued setting with env → TOML → default priority.
pub fn resolve_f64(env_var: &str, table: &toml::Table, key: &str, default: f64) -> f64 {
    if let Ok(value) = std::env::var(env_var) {
        if let Ok(parsed) = value.trim().parse::<f64>() {
            return parsed;
        }
        tracing::warn!(env_var, value = %value, "Ignoring non-numeric environment override");
    }

    table.get(key).and_then(|v| v.as_float()).unwrap_or(default)
}
