//! Error conversion and exit codes at the CLI boundary

use azcostctl::config::Config;
use azcostctl::error::{AzcostError, ConfigError, Result};
use azcostctl::exit_codes::{codes, exit_code_for_anyhow};
use tempfile::TempDir;

#[test]
fn test_config_error_conversion() {
    let err: AzcostError = ConfigError::MissingField("tenant_id".to_string()).into();
    assert!(matches!(err, AzcostError::Config(_)));
    assert!(err.to_string().contains("tenant_id"));
}

#[test]
fn test_json_error_conversion() {
    fn parse() -> Result<serde_json::Value> {
        Ok(serde_json::from_str("{not json")?)
    }
    let err = parse().unwrap_err();
    assert!(matches!(err, AzcostError::Json(_)));
    assert!(err.to_string().contains("JSON"));
}

#[test]
fn test_api_error_message() {
    let err = AzcostError::Api {
        status: reqwest::StatusCode::CONFLICT,
        message: "ScopeLocked".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains("409"));
    assert!(message.contains("ScopeLocked"));
}

#[test]
fn test_context_keeps_exit_code() {
    let err = anyhow::Error::from(AzcostError::validation("ttl", "must be >= 1"))
        .context("Failed to tag resource group rg-app");
    assert_eq!(exit_code_for_anyhow(&err), codes::USER_ERROR);

    let err = anyhow::Error::from(AzcostError::Mail("outbox unwritable".to_string()));
    assert_eq!(exit_code_for_anyhow(&err), codes::SYSTEM_ERROR);
}

#[test]
fn test_malformed_config_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[tagging\ndefault_ttl_days = ").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert_eq!(exit_code_for_anyhow(&err), codes::CONFIG_ERROR);
    assert!(format!("{:#}", err).contains("azcostctl init"));
}

#[test]
fn test_invalid_config_value_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let mut config = Config::default();
    config.tagging.owner_lookback_days = 120;
    config.save(&path).unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert_eq!(exit_code_for_anyhow(&err), codes::CONFIG_ERROR);
    assert!(err.to_string().contains("owner_lookback_days"));
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config.tagging.default_ttl_days, 7);
}
