use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub azure: AzureConfig,
    pub tagging: TaggingConfig,
    pub metrics: MetricsConfig,
    pub recommendations: RecommendationConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Resource Manager endpoint
    pub management_endpoint: String,
    /// Azure AD authority host
    pub authority_host: String,
    /// Public client used for the username/password flow
    pub user_client_id: String,
    /// Default subscription (overridden by --subscription / SUBSCRIPTION_ID)
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggingConfig {
    pub default_ttl_days: u32,
    /// How far back to search the activity log for the creating caller
    pub owner_lookback_days: i64,
    /// Tag key that exempts a resource group from TTL cleanup
    pub protected_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub window_days: i64,
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Average CPU at or above this never triggers a downsize
    pub cpu_threshold_percent: f64,
    /// CPU level the suggested size should run at
    pub target_cpu_percent: f64,
    pub memory_headroom: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: Option<String>,
    pub sender_name: String,
    pub outbox_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            azure: AzureConfig {
                management_endpoint: "https://management.azure.com".to_string(),
                authority_host: "https://login.microsoftonline.com".to_string(),
                // Azure CLI public client
                user_client_id: "04b07795-8ddb-461a-bbee-02f9e1bf7b46".to_string(),
                subscription_id: None,
            },
            tagging: TaggingConfig {
                default_ttl_days: 7,
                owner_lookback_days: 89, // activity log keeps 90 days
                protected_tag: "azcostctl:protected".to_string(),
            },
            metrics: MetricsConfig {
                window_days: 7,
                database: PathBuf::from("data/azcostctl.db"),
            },
            recommendations: RecommendationConfig {
                cpu_threshold_percent: 20.0,
                target_cpu_percent: 60.0,
                memory_headroom: 1.25,
            },
            mail: MailConfig {
                from: None,
                sender_name: "Resource Optimization Team".to_string(),
                outbox_dir: PathBuf::from("outbox"),
            },
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .azcostctl.toml in current dir, then ~/.config/azcostctl/config.toml
            let local = PathBuf::from(".azcostctl.toml");
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("azcostctl").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".azcostctl.toml"))
            }
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))
                .with_context(|| {
                    format!(
                        "Failed to parse config: {}\n  Tip: Run 'azcostctl init' to create a new config file",
                        config_path.display()
                    )
                })?;
            config.validate()?;
            Ok(config)
        } else {
            if path.is_some() {
                tracing::warn!(
                    "Config file not found: {}, using defaults",
                    config_path.display()
                );
            }
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.tagging.default_ttl_days < 1 {
            return Err(ConfigError::InvalidValue {
                field: "tagging.default_ttl_days".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(1..=90).contains(&self.tagging.owner_lookback_days) {
            return Err(ConfigError::InvalidValue {
                field: "tagging.owner_lookback_days".to_string(),
                reason: "activity log queries are limited to 1-90 days".to_string(),
            });
        }
        if self.metrics.window_days < 1 {
            return Err(ConfigError::InvalidValue {
                field: "metrics.window_days".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let rec = &self.recommendations;
        if rec.target_cpu_percent <= 0.0 || rec.target_cpu_percent > 100.0 {
            return Err(ConfigError::InvalidValue {
                field: "recommendations.target_cpu_percent".to_string(),
                reason: "must be in (0, 100]".to_string(),
            });
        }
        if rec.memory_headroom < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "recommendations.memory_headroom".to_string(),
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
