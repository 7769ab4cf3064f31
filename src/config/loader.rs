//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::Value;

use crate::config::validation::ValidationError;
use crate::config::Config;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Path of the local override for `path`: `app.toml` → `app.local.toml`.
pub fn local_override_path(path: &Path) -> PathBuf {
    path.with_extension("local.toml")
}

/// Load, merge and validate configuration from a TOML file.
///
/// A sibling `*.local.toml` file, when present, is merged over the base file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut raw = read_toml(path)?;

    let local = local_override_path(path);
    if local.exists() {
        let overrides = read_toml(&local)?;
        merge_values(&mut raw, overrides);
        tracing::debug!(path = %local.display(), "Merged local config override");
    }

    let config = Config::from_value(raw)?;
    config.validate()?;

    Ok(config)
}

fn read_toml(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Recursively merge `overlay` into `base`.
///
/// Tables merge key by key; any other value in `overlay` replaces the one in
/// `base`, arrays included.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
