//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config.toml (+ optional config.local.toml override)
//!     → loader.rs (parse, merge, deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (typed AppConfig + raw TOML tree)
//!     → shared via Arc<ArcSwap<Config>> to router, app and middleware factories
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the shared snapshot
//!     → the next request observes the new config
//! ```
//!
//! # Design Decisions
//! - A snapshot is immutable; changes replace the whole snapshot
//! - All fields have defaults to allow minimal configs
//! - Dot-path lookups read the raw tree, so keys outside the schema work too

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use toml::value::Table;
use toml::Value;

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, AuthConfig, MiddlewareConfig, ObservabilityConfig, RateLimitConfig, ServerConfig,
    SessionConfig,
};

/// Configuration snapshot shared between the app and its collaborators.
pub type SharedConfig = Arc<ArcSwap<Config>>;

/// Wrap a config for sharing.
pub fn shared(config: Config) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// A configuration snapshot: the typed settings plus the document they came from.
#[derive(Debug, Clone)]
pub struct Config {
    raw: Value,
    settings: AppConfig,
}

impl Config {
    /// Build a config from a parsed TOML tree.
    pub fn from_value(raw: Value) -> Result<Self, ConfigError> {
        let settings: AppConfig = raw.clone().try_into().map_err(ConfigError::Parse)?;
        Ok(Self { raw, settings })
    }

    /// Parse a config from TOML text. No validation is performed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: Value = toml::from_str(content).map_err(ConfigError::Parse)?;
        Self::from_value(raw)
    }

    /// Typed view of the configuration.
    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }

    /// Run semantic validation on the typed settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(&self.settings).map_err(ConfigError::Validation)
    }

    /// The raw TOML tree.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Look up a value by dot-separated path, e.g. `middleware.groups.admin`.
    ///
    /// Returns `None` as soon as a segment is absent or a non-table is
    /// traversed.
    pub fn get_path(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.raw, |value, part| value.as_table()?.get(part))
    }

    /// Look up and deserialize a value, falling back to `default` when the
    /// path is absent or holds a different type.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_path(key) {
            Some(value) => match value.clone().try_into() {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(key, error = %e, "Config value has unexpected type, using default");
                    default
                }
            },
            None => default,
        }
    }

    /// Set a value by dot-separated path, creating intermediate tables.
    ///
    /// Non-table values in the way are replaced by tables. The typed settings
    /// are re-derived; on failure the snapshot is left unchanged.
    pub fn set_path(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let mut raw = self.raw.clone();
        let path: Vec<&str> = key.split('.').collect();
        set_in(&mut raw, &path, value.into());

        *self = Self::from_value(raw)?;
        Ok(())
    }
}

/// Replace the value at `path` below `node`, turning anything in the way
/// into a table.
fn set_in(node: &mut Value, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_table() {
        *node = Value::Table(Table::new());
    }
    if let Value::Table(table) = node {
        let child = table
            .entry(first.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        set_in(child, rest, value);
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = AppConfig::default();
        let raw = Value::try_from(&settings).unwrap_or_else(|_| Value::Table(Table::new()));
        Self { raw, settings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        bind_address = "127.0.0.1:9000"

        [middleware]
        global = ["request_log"]

        [middleware.groups]
        admin = ["auth", "security_headers"]

        [custom]
        flag = true
    "#;

    #[test]
    fn test_get_path_walks_tables() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.get_path("server.bind_address").and_then(Value::as_str),
            Some("127.0.0.1:9000")
        );
        assert_eq!(config.get_path("custom.flag").and_then(Value::as_bool), Some(true));
        assert!(config.get_path("custom.flag.deeper").is_none());
        assert!(config.get_path("missing.key").is_none());
    }

    #[test]
    fn test_get_or_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let admin: Vec<String> = config.get_or("middleware.groups.admin", Vec::new());
        assert_eq!(admin, vec!["auth", "security_headers"]);

        let frontend: Vec<String> = config.get_or("middleware.groups.frontend", Vec::new());
        assert!(frontend.is_empty());

        // Wrong type falls back too.
        let flag: Vec<String> = config.get_or("custom.flag", vec!["x".into()]);
        assert_eq!(flag, vec!["x"]);
    }

    #[test]
    fn test_unlisted_sections_use_schema_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.settings().server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.settings().server.request_timeout_secs, 30);
        assert_eq!(config.settings().session.cookie_name, "FASTYSESSID");
    }

    #[test]
    fn test_set_path_updates_settings() {
        let mut config = Config::default();
        config
            .set_path("middleware.groups.reports", Value::Array(vec!["auth".into()]))
            .unwrap();
        config.set_path("auth.login_path", "/?q=login").unwrap();

        assert_eq!(
            config.settings().middleware.groups.get("reports"),
            Some(&vec!["auth".to_string()])
        );
        assert_eq!(config.settings().auth.login_path.as_deref(), Some("/?q=login"));
    }

    #[test]
    fn test_set_path_rejects_mistyped_schema_value() {
        let mut config = Config::default();
        let err = config.set_path("server.request_timeout_secs", "soon");
        assert!(err.is_err());
        assert_eq!(config.settings().server.request_timeout_secs, 30);
    }

    #[test]
    fn test_set_path_replaces_scalar_in_the_way() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.set_path("custom.flag.level", 3).unwrap();
        assert_eq!(
            config.get_path("custom.flag.level").and_then(Value::as_integer),
            Some(3)
        );

        // A table value replaces rather than merges.
        let mut groups = Table::new();
        groups.insert("ops".into(), Value::Array(vec!["auth".into()]));
        config.set_path("middleware.groups", groups).unwrap();
        assert!(config.get_path("middleware.groups.admin").is_none());
        assert!(config.settings().middleware.groups.contains_key("ops"));
    }

    #[test]
    fn test_default_exposes_default_groups_by_path() {
        let config = Config::default();
        let admin: Vec<String> = config.get_or("middleware.groups.admin", Vec::new());
        assert_eq!(admin, vec!["auth"]);
    }
}
