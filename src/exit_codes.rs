//! Exit code standardization for azcostctl
//!
//! ## Exit Code Convention
//!
//! - `0` = Success
//! - `1` = User error (invalid input, validation failure, resource not found)
//! - `2` = System error (Azure API failure, network error, store failure)
//! - `3` = Configuration error (missing config, invalid credentials, config parse error)

use crate::error::{AzcostError, ConfigError};

/// Standard exit codes for azcostctl
pub mod codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// User error (invalid input, validation failure)
    pub const USER_ERROR: i32 = 1;
    /// System error (Azure API failure, network error)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error (missing config, invalid credentials)
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map an AzcostError to an appropriate exit code
pub fn exit_code_for_error(error: &AzcostError) -> i32 {
    use AzcostError::*;
    match error {
        Config(_) | Auth(_) => codes::CONFIG_ERROR,

        Validation { .. } | ResourceNotFound { .. } => codes::USER_ERROR,

        Api { .. } | Http(_) | Json(_) | Io(_) | Store(_) | Mail(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit code for an error surfaced through `anyhow` at the CLI boundary.
pub fn exit_code_for_anyhow(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<AzcostError>() {
        return exit_code_for_error(e);
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return codes::CONFIG_ERROR;
    }
    codes::SYSTEM_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        let validation = AzcostError::Validation {
            field: "ttl".to_string(),
            reason: "must be >= 1".to_string(),
        };
        assert_eq!(exit_code_for_error(&validation), codes::USER_ERROR);

        let config = AzcostError::Config(ConfigError::MissingField("tenant_id".to_string()));
        assert_eq!(exit_code_for_error(&config), codes::CONFIG_ERROR);

        let auth = AzcostError::Auth("invalid_client".to_string());
        assert_eq!(exit_code_for_error(&auth), codes::CONFIG_ERROR);

        let api = AzcostError::Api {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".to_string(),
        };
        assert_eq!(exit_code_for_error(&api), codes::SYSTEM_ERROR);
    }

    #[test]
    fn test_exit_code_for_anyhow_downcasts() {
        let err = anyhow::Error::from(AzcostError::ResourceNotFound {
            resource_type: "resource group".to_string(),
            name: "rg-missing".to_string(),
        });
        assert_eq!(exit_code_for_anyhow(&err), codes::USER_ERROR);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for_anyhow(&plain), codes::SYSTEM_ERROR);
        assert_eq!(codes::SUCCESS, 0);

        let config = anyhow::Error::from(ConfigError::ParseError("bad toml".to_string()))
            .context("Failed to parse config");
        assert_eq!(exit_code_for_anyhow(&config), codes::CONFIG_ERROR);
    }
}
