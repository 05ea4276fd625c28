//! Error types for azcostctl
//!
//! There are two error types: `AzcostError` (main error enum) and
//! `ConfigError` (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `AzcostError`.
//! CLI code uses `anyhow::Result<T>` for top-level error handling. The
//! conversion happens at the CLI boundary, where `exit_codes` picks the
//! process exit status from the variant.
//!
//! ## When to Use Which Error
//!
//! - `ConfigError`: configuration parsing and validation issues
//!   - Automatically converted to `AzcostError::Config` via `#[from]`
//!
//! - `Auth`: Azure AD refused to issue a token, or the token response was
//!   unusable
//!
//! - `Api`: the management API answered with a non-success status code.
//!   `message` carries the ARM `error.message` when the body had one
//!
//! - `Http`: the request never produced a response (DNS, TLS, connection)
//!
//! - `ResourceNotFound`: a resource the caller asked for does not exist.
//!   Operations whose contract treats absence as a normal outcome (deletion,
//!   existence checks) return `Ok(false)`/`None` instead
//!
//! - `Validation`: input validation failures (empty names, TTL < 1, bad
//!   email addresses)

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for azcostctl
#[derive(Error, Debug)]
pub enum AzcostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Azure API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resource not found: {resource_type} - {name}")]
    ResourceNotFound { resource_type: String, name: String },

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AzcostError>;

impl AzcostError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        AzcostError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource_type: &str, name: impl Into<String>) -> Self {
        AzcostError::ResourceNotFound {
            resource_type: resource_type.to_string(),
            name: name.into(),
        }
    }
}

/// Reject empty (or whitespace-only) required inputs.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AzcostError::validation(field, "is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("resource_group", "rg-app").is_ok());
        let err = require("resource_group", "   ").unwrap_err();
        assert!(matches!(err, AzcostError::Validation { .. }));
        assert!(err.to_string().contains("resource_group"));
    }

    #[test]
    fn test_api_error_display() {
        let err = AzcostError::Api {
            status: StatusCode::FORBIDDEN,
            message: "AuthorizationFailed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("AuthorizationFailed"));
    }
}
