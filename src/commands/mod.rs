//! Command handlers for the azcostctl binary
//!
//! Handlers print either a table (text) or pretty JSON, and return
//! `anyhow::Result` so `main` can pick the exit code.

pub mod governance;
pub mod groups;
pub mod sizing;
pub mod vm;

use anyhow::Result;
use azcostctl::auth::{token_for_service_principal, token_for_user};
use azcostctl::config::Config;
use azcostctl::error::{AzcostError, ConfigError};
use azcostctl::mailer::OutboxMailer;
use azcostctl::ArmClient;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Credentials and scope. Every flag falls back to its environment variable.
#[derive(Args, Debug, Clone, Default)]
pub struct AzureArgs {
    /// Azure AD tenant id
    #[arg(long, env = "TENANT_ID", global = true)]
    pub tenant_id: Option<String>,

    /// Service principal application id
    #[arg(long, env = "CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Service principal secret
    #[arg(long, env = "CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// User account for the password flow (when no client secret is given)
    #[arg(long, env = "AZURE_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "AZURE_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Subscription to operate on
    #[arg(long = "subscription", env = "SUBSCRIPTION_ID", global = true)]
    pub subscription_id: Option<String>,
}

fn missing(field: &str) -> AzcostError {
    AzcostError::Config(ConfigError::MissingField(field.to_string()))
}

/// Acquire a token and build the ARM client for the selected subscription.
pub async fn connect(args: &AzureArgs, config: &Config) -> Result<ArmClient> {
    let subscription_id = args
        .subscription_id
        .clone()
        .or_else(|| config.azure.subscription_id.clone())
        .ok_or_else(|| missing("subscription_id (--subscription or SUBSCRIPTION_ID)"))?;
    let tenant_id = args
        .tenant_id
        .as_deref()
        .ok_or_else(|| missing("tenant_id (--tenant-id or TENANT_ID)"))?;

    let http = reqwest::Client::new();
    let authority = config.azure.authority_host.as_str();
    let token = match (&args.client_id, &args.client_secret, &args.username, &args.password) {
        (Some(client_id), Some(secret), _, _) => {
            token_for_service_principal(&http, authority, tenant_id, client_id, secret).await?
        }
        (_, _, Some(username), Some(password)) => {
            token_for_user(
                &http,
                authority,
                tenant_id,
                username,
                password,
                &config.azure.user_client_id,
            )
            .await?
        }
        _ => {
            return Err(missing(
                "credentials (CLIENT_ID + CLIENT_SECRET, or AZURE_USERNAME + AZURE_PASSWORD)",
            )
            .into())
        }
    };
    debug!("Using subscription {}", subscription_id);

    Ok(ArmClient::with_http(
        http,
        config.azure.management_endpoint.as_str(),
        subscription_id,
        token,
    )?)
}

/// Outbox mailer plus the sender address (flag, then config).
pub fn mailer(config: &Config, from: Option<String>) -> Result<(OutboxMailer, String)> {
    let from = from
        .or_else(|| config.mail.from.clone())
        .ok_or_else(|| missing("mail.from (--from or MAIL_FROM)"))?;
    Ok((OutboxMailer::new(&config.mail.outbox_dir), from))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
