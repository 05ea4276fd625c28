//! Input validation utilities
//!
//! Provides validation functions for user inputs to prevent
//! invalid data from reaching the management API.

use crate::error::{AzcostError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+$").ok())
        .as_ref()
}

/// Loose email check: one `@` with a non-empty local part and domain.
pub fn is_valid_email(email: &str) -> bool {
    email_regex()
        .map(|re| re.is_match(email.trim()))
        .unwrap_or(false)
}

pub fn validate_email(field: &str, email: &str) -> Result<()> {
    if !is_valid_email(email) {
        return Err(AzcostError::Validation {
            field: field.to_string(),
            reason: format!("not an email address: '{}'", email),
        });
    }
    Ok(())
}

/// Validate resource group name
///
/// Resource group names are 1-90 characters of alphanumerics, underscores,
/// hyphens, periods and parentheses, and cannot end in a period.
pub fn validate_resource_group_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 90 {
        return Err(AzcostError::Validation {
            field: "resource_group".to_string(),
            reason: format!("must be 1-90 characters, got {}", name.len()),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')'))
    {
        return Err(AzcostError::Validation {
            field: "resource_group".to_string(),
            reason: format!("contains invalid characters: '{}'", name),
        });
    }
    if name.ends_with('.') {
        return Err(AzcostError::Validation {
            field: "resource_group".to_string(),
            reason: "cannot end with a period".to_string(),
        });
    }
    Ok(())
}

/// Validate the TTL value, in days
pub fn validate_ttl(days: u32) -> Result<()> {
    if days < 1 {
        return Err(AzcostError::Validation {
            field: "ttl".to_string(),
            reason: "must be greater than or equal to 1".to_string(),
        });
    }
    Ok(())
}
