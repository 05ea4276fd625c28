//! Shared fixtures for the mocked ARM tests
#![allow(dead_code)]

use azcostctl::auth::AccessToken;
use azcostctl::ArmClient;
use mockito::{Matcher, ServerGuard};

pub const SUBSCRIPTION: &str = "sub-123";
pub const TOKEN: &str = "test-token";

pub fn client(server: &ServerGuard) -> ArmClient {
    ArmClient::new(server.url(), SUBSCRIPTION, AccessToken::new(TOKEN)).unwrap()
}

/// Path under the test subscription.
pub fn sub_path(path: &str) -> String {
    format!("/subscriptions/{}{}", SUBSCRIPTION, path)
}

pub fn api_version(version: &str) -> Matcher {
    Matcher::UrlEncoded("api-version".into(), version.into())
}

pub fn bearer() -> String {
    format!("Bearer {}", TOKEN)
}

pub const ARM_500: &str =
    r#"{"error":{"code":"InternalServerError","message":"Something went wrong"}}"#;
