//! Owner discovery from the subscription activity log
//!
//! The creator of a resource group is the `caller` of the successful
//! `resourcegroups/write` event that created it. Owner discovery is best
//! effort: failures are logged and surface as "no owner", never as errors,
//! so a single unreadable log does not stop a tagging pass.

use crate::client::ArmClient;
use crate::error::{require, Result};
use crate::validation::is_valid_email;
use chrono::{Duration, SecondsFormat, Utc};
use tracing::{debug, error, warn};

use super::types::{ActivityLogEntry, ListResponse};

pub const API_VERSION: &str = "2015-04-01";
pub const RESOURCE_GROUP_WRITE: &str = "Microsoft.Resources/subscriptions/resourcegroups/write";
pub const CREATED_STATUS: &str = "Created";

/// Build the `$filter` expression for the creation event of a resource group.
pub fn creation_event_filter(resource_group: &str, lookback_days: i64) -> String {
    let end = Utc::now();
    let start = end - Duration::days(lookback_days);
    format!(
        "eventTimestamp ge '{}' and eventTimestamp le '{}' and resourceGroupName eq '{}' and operationName eq '{}'",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true),
        resource_group,
        RESOURCE_GROUP_WRITE
    )
}

/// Query the activity log for the creation event of `resource_group`.
pub async fn fetch_creation_events(
    client: &ArmClient,
    resource_group: &str,
    lookback_days: i64,
) -> Result<Vec<ActivityLogEntry>> {
    require("resource_group", resource_group)?;
    let url = client.subscription_url(
        "/providers/microsoft.insights/eventtypes/management/values",
    );
    let filter = creation_event_filter(resource_group, lookback_days);
    let response: Option<ListResponse<ActivityLogEntry>> = client
        .get_typed(
            &url,
            &[
                ("api-version", API_VERSION),
                ("$filter", filter.as_str()),
                (
                    "$select",
                    "operationName,caller,properties,resourceGroupName,eventTimestamp",
                ),
            ],
        )
        .await?;
    Ok(response.map(|r| r.value).unwrap_or_default())
}

/// First entry, in API order, recording the creation of `resource_group`.
pub fn find_creator(entries: &[ActivityLogEntry], resource_group: &str) -> Option<String> {
    entries
        .iter()
        .find(|entry| {
            let operation_matches = entry
                .operation_name
                .as_ref()
                .and_then(|op| op.value.as_deref())
                .map(|op| op.eq_ignore_ascii_case(RESOURCE_GROUP_WRITE))
                .unwrap_or(false);
            let group_matches = entry
                .resource_group_name
                .as_deref()
                .map(|rg| rg.eq_ignore_ascii_case(resource_group))
                .unwrap_or(false);
            operation_matches
                && group_matches
                && entry.status_code() == Some(CREATED_STATUS)
                && entry.caller.as_deref().is_some_and(|c| !c.is_empty())
        })
        .and_then(|entry| entry.caller.clone())
}

/// Email address of whoever created `resource_group`, if it can be determined.
pub async fn fetch_resource_group_creator(
    client: &ArmClient,
    resource_group: &str,
    lookback_days: i64,
) -> Option<String> {
    let entries = match fetch_creation_events(client, resource_group, lookback_days).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Error fetching activity logs for {}: {}", resource_group, e);
            return None;
        }
    };
    debug!(
        "{} activity log entries for resource group {}",
        entries.len(),
        resource_group
    );

    let Some(caller) = find_creator(&entries, resource_group) else {
        warn!(
            "Creator of resource group {} not found in the last {} days",
            resource_group, lookback_days
        );
        return None;
    };

    if !is_valid_email(&caller) {
        // service principals show up as object ids
        error!("Creator of {} is not an email address: {}", resource_group, caller);
        return None;
    }
    Some(caller)
}
