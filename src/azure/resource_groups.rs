//! Resource group enumeration and deletion

use crate::client::ArmClient;
use crate::error::{require, AzcostError, Result};
use reqwest::StatusCode;
use tracing::{info, warn};

use super::types::{ListResponse, ResourceGroup};

pub const API_VERSION: &str = "2020-06-01";

fn group_url(client: &ArmClient, name: &str) -> String {
    client.subscription_url(&format!("/resourcegroups/{}", name))
}

/// List every resource group in the subscription (first page only).
pub async fn list_resource_groups(client: &ArmClient) -> Result<Vec<ResourceGroup>> {
    let url = client.subscription_url("/resourcegroups");
    let groups = client
        .get_typed::<ListResponse<ResourceGroup>>(
            &url,
            &[("api-version", API_VERSION), ("$expand", "createdTime")],
        )
        .await?
        .ok_or_else(|| AzcostError::not_found("subscription", client.subscription_id()))?
        .value;
    info!(
        "Found {} resource group(s) in subscription {}",
        groups.len(),
        client.subscription_id()
    );
    Ok(groups)
}

pub async fn get_resource_group(client: &ArmClient, name: &str) -> Result<Option<ResourceGroup>> {
    require("resource_group", name)?;
    client
        .get_typed(&group_url(client, name), &[("api-version", API_VERSION)])
        .await
}

/// Delete a resource group.
///
/// Returns `false` when the group does not exist or ARM answers the delete
/// with anything other than `200 OK` / `202 Accepted`.
pub async fn delete_resource_group(client: &ArmClient, name: &str) -> Result<bool> {
    require("resource_group", name)?;
    let url = group_url(client, name);
    let query = [("api-version", API_VERSION)];

    if !client.exists(&url, &query).await? {
        warn!(
            "Resource group {} not found in subscription {}",
            name,
            client.subscription_id()
        );
        return Ok(false);
    }

    let status = client.delete(&url, &query).await?;
    match status {
        StatusCode::OK | StatusCode::ACCEPTED => {
            info!("Resource group {} deletion accepted ({})", name, status);
            Ok(true)
        }
        other => {
            warn!("Resource group {} deletion returned {}", name, other);
            Ok(false)
        }
    }
}
