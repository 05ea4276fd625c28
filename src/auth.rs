//! Azure AD token acquisition
//!
//! Both flows post a form to the v1 `oauth2/token` endpoint of the tenant and
//! ask for a token scoped to the Resource Manager audience.

use crate::error::{require, AzcostError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

/// Audience every token is requested for.
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Bearer token for the management API.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_on: None,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    // v1 endpoint returns epoch seconds as a string
    expires_on: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Client-credentials flow for a service principal.
pub async fn token_for_service_principal(
    http: &reqwest::Client,
    authority: &str,
    tenant_id: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<AccessToken> {
    require("tenant_id", tenant_id)?;
    require("client_id", client_id)?;
    require("client_secret", client_secret)?;

    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("resource", MANAGEMENT_RESOURCE),
    ];
    let token = request_token(http, authority, tenant_id, &form).await?;
    info!("Acquired access token for service principal {}", client_id);
    Ok(token)
}

/// Resource-owner password flow for an interactive user account.
pub async fn token_for_user(
    http: &reqwest::Client,
    authority: &str,
    tenant_id: &str,
    username: &str,
    password: &str,
    client_id: &str,
) -> Result<AccessToken> {
    require("tenant_id", tenant_id)?;
    require("username", username)?;
    require("password", password)?;

    let form = [
        ("grant_type", "password"),
        ("client_id", client_id),
        ("username", username),
        ("password", password),
        ("resource", MANAGEMENT_RESOURCE),
    ];
    let token = request_token(http, authority, tenant_id, &form).await?;
    info!("Acquired access token for user {}", username);
    Ok(token)
}

async fn request_token(
    http: &reqwest::Client,
    authority: &str,
    tenant_id: &str,
    form: &[(&str, &str)],
) -> Result<AccessToken> {
    let url = format!(
        "{}/{}/oauth2/token",
        authority.trim_end_matches('/'),
        tenant_id
    );
    debug!("POST {}", url);

    let response = http.post(&url).form(form).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<TokenErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error_description.or(e.error))
            .unwrap_or(body);
        return Err(AzcostError::Auth(format!(
            "token request failed with {}: {}",
            status, detail
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)?;
    let secret = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AzcostError::Auth("token response has no access_token".to_string()))?;
    let expires_on = parsed
        .expires_on
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Ok(AccessToken { secret, expires_on })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let token = AccessToken::new("eyJ0eXAiOiJKV1Q");
        let dbg = format!("{:?}", token);
        assert!(!dbg.contains("eyJ0eXAiOiJKV1Q"));
        assert!(dbg.contains("redacted"));
        assert_eq!(token.secret(), "eyJ0eXAiOiJKV1Q");
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_before_request() {
        let http = reqwest::Client::new();
        let err = token_for_service_principal(&http, "http://127.0.0.1:9", "", "id", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AzcostError::Validation { .. }));
    }
}
