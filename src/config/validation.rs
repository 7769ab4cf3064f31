//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject blank middleware identifiers and group names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Identifiers are not checked against the registry here; unknown ones
//!   are skipped with a warning when a pipeline is built

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("`{}` is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "server.max_body_bytes",
            "must be greater than zero",
        ));
    }
    if config.server.max_file_bytes == 0 {
        errors.push(ValidationError::new(
            "server.max_file_bytes",
            "must be greater than zero",
        ));
    }

    let cookie = &config.session.cookie_name;
    if cookie.is_empty() || !cookie.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must be a non-empty token of letters, digits, `_` or `-`",
        ));
    }

    if config.session.idle_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "session.idle_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.session.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "session.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    for (i, id) in config.middleware.global.iter().enumerate() {
        if id.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("middleware.global[{i}]"),
                "identifier is blank",
            ));
        }
    }
    for (group, ids) in &config.middleware.groups {
        if group.trim().is_empty() {
            errors.push(ValidationError::new("middleware.groups", "group name is blank"));
        }
        for (i, id) in ids.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("middleware.groups.{group}[{i}]"),
                    "identifier is blank",
                ));
            }
        }
    }

    if config.auth.session_key.is_empty() {
        errors.push(ValidationError::new("auth.session_key", "must not be empty"));
    }
    if let Some(path) = &config.auth.login_path {
        if !path.starts_with('/') && url::Url::parse(path).is_err() {
            errors.push(ValidationError::new(
                "auth.login_path",
                "must be an absolute path or URL",
            ));
        }
    }

    if config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be greater than zero",
        ));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new(
            "rate_limit.burst_size",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.server.request_timeout_secs = 0;
        config.middleware.global.push("  ".into());
        config.auth.login_path = Some("login".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "server.request_timeout_secs",
                "middleware.global[1]",
                "auth.login_path",
            ]
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cookie_name_rejects_separators() {
        let mut config = AppConfig::default();
        config.session.cookie_name = "sess;id".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "session.cookie_name");
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let mut config = AppConfig::default();
        config.server.max_file_bytes = 0;
        config.session.idle_timeout_secs = 0;
        config.session.sweep_interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.max_file_bytes",
                "session.idle_timeout_secs",
                "session.sweep_interval_secs",
            ]
        );
    }
}
