//! Authenticated HTTP plumbing for the Azure Resource Manager API
//!
//! Every module talks to ARM through `ArmClient`, which owns the bearer token
//! and the subscription scope. Responses are branched on status code here so
//! that callers only see `Ok(None)` for a 404, a parsed body for a success, or
//! an `AzcostError::Api` for anything else.

use crate::auth::AccessToken;
use crate::error::{require, AzcostError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    base_url: String,
    token: AccessToken,
    subscription_id: String,
}

impl ArmClient {
    pub fn new(
        base_url: impl Into<String>,
        subscription_id: impl Into<String>,
        token: AccessToken,
    ) -> Result<Self> {
        Self::with_http(reqwest::Client::new(), base_url, subscription_id, token)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        subscription_id: impl Into<String>,
        token: AccessToken,
    ) -> Result<Self> {
        let subscription_id = subscription_id.into();
        require("subscription_id", &subscription_id)?;
        require("access_token", token.secret())?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            subscription_id,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// URL under the subscription scope; `path` starts with `/`.
    pub fn subscription_url(&self, path: &str) -> String {
        format!(
            "{}/subscriptions/{}{}",
            self.base_url, self.subscription_id, path
        )
    }

    /// URL for a full ARM resource id (`/subscriptions/.../providers/...`).
    pub fn resource_url(&self, resource_id: &str) -> String {
        format!("{}{}", self.base_url, resource_id)
    }

    fn request(&self, method: Method, url: &str, query: &[(&str, &str)]) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(self.token.secret())
            .query(query)
    }

    /// GET returning the JSON body, or `None` when the resource does not exist.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let response = self.request(Method::GET, url, query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        match self.get_json(url, query).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Existence check: `true` on 2xx, `false` on 404.
    pub async fn exists(&self, url: &str, query: &[(&str, &str)]) -> Result<bool> {
        let response = self.request(Method::GET, url, query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    pub async fn patch_json(&self, url: &str, query: &[(&str, &str)], body: &Value) -> Result<Value> {
        let response = self
            .request(Method::PATCH, url, query)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// DELETE returning the success status (ARM answers 200, 202 or 204).
    pub async fn delete(&self, url: &str, query: &[(&str, &str)]) -> Result<StatusCode> {
        let response = self.request(Method::DELETE, url, query).send().await?;
        let response = check_status(response).await?;
        Ok(response.status())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AzcostError::Api {
        status,
        message: arm_error_message(&body),
    })
}

/// Pull `error.message` out of an ARM error body, falling back to the raw text.
pub(crate) fn arm_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            let message = err.get("message")?.as_str()?;
            Some(match err.get("code").and_then(Value::as_str) {
                Some(code) => format!("{}: {}", code, message),
                None => message.to_string(),
            })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ArmClient {
        ArmClient::new(
            "https://management.azure.com/",
            "00000000-0000-0000-0000-000000000001",
            AccessToken::new("token"),
        )
        .unwrap()
    }

    #[test]
    fn test_subscription_url() {
        assert_eq!(
            client().subscription_url("/resourcegroups"),
            "https://management.azure.com/subscriptions/00000000-0000-0000-0000-000000000001/resourcegroups"
        );
    }

    #[test]
    fn test_resource_url_from_id() {
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic1";
        assert_eq!(
            client().resource_url(id),
            format!("https://management.azure.com{}", id)
        );
    }

    #[test]
    fn test_requires_subscription() {
        let err = ArmClient::new(DEFAULT_MANAGEMENT_ENDPOINT, "", AccessToken::new("t")).unwrap_err();
        assert!(matches!(err, AzcostError::Validation { .. }));
    }

    #[test]
    fn test_arm_error_message() {
        let body = r#"{"error":{"code":"ResourceGroupNotFound","message":"Resource group 'x' could not be found."}}"#;
        assert_eq!(
            arm_error_message(body),
            "ResourceGroupNotFound: Resource group 'x' could not be found."
        );
        assert_eq!(arm_error_message("upstream timeout"), "upstream timeout");
    }
}
