//! Resource group tag management
//!
//! Tag writes read the current tags, merge the update in, and PATCH the
//! merged set back. A merge that changes nothing skips the PATCH, so applying
//! the same tag twice costs one read and no write.

use crate::client::ArmClient;
use crate::error::{require, AzcostError, Result};
use crate::validation::{validate_email, validate_ttl};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::types::{ResourceGroup, Tags};

pub const API_VERSION: &str = "2021-04-01";
pub const OWNER_EMAIL_TAG: &str = "OwnerEmail";
pub const TTL_TAG: &str = "TTL";
pub const DEFAULT_TTL_DAYS: u32 = 7;

/// Outcome of a tag write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// The resource already carried the requested tags; nothing was written
    Unchanged,
    /// Tags were written; holds the full tag set after the write
    Updated(Tags),
}

impl TagChange {
    pub fn was_written(&self) -> bool {
        matches!(self, TagChange::Updated(_))
    }
}

/// Operation accepted by the `Microsoft.Resources/tags` API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOperation {
    Merge,
    Replace,
    Delete,
}

fn group_url(client: &ArmClient, resource_group: &str) -> String {
    client.subscription_url(&format!("/resourcegroups/{}", resource_group))
}

fn tags_api_url(client: &ArmClient, resource_group: &str) -> String {
    client.subscription_url(&format!(
        "/resourcegroups/{}/providers/Microsoft.Resources/tags/default",
        resource_group
    ))
}

/// Current tags of a resource group.
pub async fn get_tags(client: &ArmClient, resource_group: &str) -> Result<Tags> {
    require("resource_group", resource_group)?;
    let group: ResourceGroup = client
        .get_typed(&group_url(client, resource_group), &[("api-version", API_VERSION)])
        .await?
        .ok_or_else(|| AzcostError::not_found("resource group", resource_group))?;
    Ok(group.tags)
}

/// `existing` with every entry of `updates` set; updates win on conflicts.
pub fn merge_tags(existing: &Tags, updates: &Tags) -> Tags {
    let mut merged = existing.clone();
    merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

pub fn has_owner_email_tag(tags: &Tags) -> bool {
    tags.get(OWNER_EMAIL_TAG).is_some_and(|v| !v.trim().is_empty())
}

/// Any `TTL` tag counts, even one `ttl_days` cannot parse; such groups keep
/// their value and never expire.
pub fn has_ttl_tag(tags: &Tags) -> bool {
    tags.contains_key(TTL_TAG)
}

/// TTL in days, when the tag is present and a positive integer.
pub fn ttl_days(tags: &Tags) -> Option<u32> {
    tags.get(TTL_TAG)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|d| *d >= 1)
}

/// Read tags, merge `updates` in, and write the result back if it changed.
pub async fn apply_tags(client: &ArmClient, resource_group: &str, updates: &Tags) -> Result<TagChange> {
    let existing = get_tags(client, resource_group).await?;
    let merged = merge_tags(&existing, updates);
    if merged == existing {
        debug!("Tags of {} already up to date", resource_group);
        return Ok(TagChange::Unchanged);
    }

    client
        .patch_json(
            &group_url(client, resource_group),
            &[("api-version", API_VERSION)],
            &json!({ "tags": merged }),
        )
        .await?;
    Ok(TagChange::Updated(merged))
}

pub async fn add_owner_email_tag(
    client: &ArmClient,
    resource_group: &str,
    owner_email: &str,
) -> Result<TagChange> {
    validate_email("owner_email", owner_email)?;
    let updates = Tags::from([(OWNER_EMAIL_TAG.to_string(), owner_email.to_string())]);
    let change = apply_tags(client, resource_group, &updates).await?;
    if change.was_written() {
        info!("Added {} tag to resource group {}", OWNER_EMAIL_TAG, resource_group);
    }
    Ok(change)
}

pub async fn add_ttl_tag(client: &ArmClient, resource_group: &str, ttl_days: u32) -> Result<TagChange> {
    validate_ttl(ttl_days)?;
    let updates = Tags::from([(TTL_TAG.to_string(), ttl_days.to_string())]);
    let change = apply_tags(client, resource_group, &updates).await?;
    if change.was_written() {
        info!("Added {} tag to resource group {}", TTL_TAG, resource_group);
    }
    Ok(change)
}

/// Write tags through the Tags API, which merges, replaces or deletes server-side.
pub async fn update_tags(
    client: &ArmClient,
    resource_group: &str,
    operation: TagOperation,
    tags: &Tags,
) -> Result<Tags> {
    require("resource_group", resource_group)?;
    let body = json!({
        "operation": operation,
        "properties": { "tags": tags },
    });
    let response = client
        .patch_json(
            &tags_api_url(client, resource_group),
            &[("api-version", API_VERSION)],
            &body,
        )
        .await?;

    let result = response
        .pointer("/properties/tags")
        .cloned()
        .map(serde_json::from_value::<Tags>)
        .transpose()?
        .unwrap_or_default();
    info!("Tags of {} updated ({:?})", resource_group, operation);
    Ok(result)
}

/// Remove a single tag. Absent keys are left alone.
pub async fn delete_tag(client: &ArmClient, resource_group: &str, key: &str) -> Result<TagChange> {
    require("tag", key)?;
    let existing = get_tags(client, resource_group).await?;
    let Some(value) = existing.get(key) else {
        debug!("Resource group {} has no {} tag", resource_group, key);
        return Ok(TagChange::Unchanged);
    };

    let doomed = Tags::from([(key.to_string(), value.clone())]);
    update_tags(client, resource_group, TagOperation::Delete, &doomed).await?;

    let mut remaining = existing;
    remaining.remove(key);
    Ok(TagChange::Updated(remaining))
}
