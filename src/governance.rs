//! Subscription-wide governance passes
//!
//! `tag_resource_groups` makes sure every resource group carries an owner and
//! a TTL. `cleanup_expired` deletes the groups whose TTL has run out, with the
//! same dry-run / force / protection rules the rest of the CLI uses.

use crate::azure::owner::fetch_resource_group_creator;
use crate::azure::resource_groups::{delete_resource_group, list_resource_groups};
use crate::azure::tags::{
    add_owner_email_tag, add_ttl_tag, has_owner_email_tag, has_ttl_tag, ttl_days, OWNER_EMAIL_TAG,
};
use crate::azure::types::ResourceGroup;
use crate::client::ArmClient;
use crate::error::Result;
use crate::mailer::{render_unused_resources_notice, EmailMessage, Mailer, UNUSED_RESOURCES_SUBJECT};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct TaggingPolicy {
    pub default_ttl_days: u32,
    pub owner_lookback_days: i64,
    pub dry_run: bool,
}

/// What the tagging pass did with one tag on one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "detail", rename_all = "snake_case")]
pub enum TagAction {
    AlreadyTagged,
    Tagged(String),
    WouldTag(String),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupTagging {
    pub name: String,
    pub owner: TagAction,
    pub ttl: TagAction,
}

#[derive(Debug, Default, Serialize)]
pub struct TaggingReport {
    pub groups: Vec<GroupTagging>,
}

impl TaggingReport {
    pub fn tagged(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| [&g.owner, &g.ttl])
            .filter(|a| matches!(a, TagAction::Tagged(_)))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| [&g.owner, &g.ttl])
            .filter(|a| matches!(a, TagAction::Failed(_)))
            .count()
    }
}

/// Tag one resource group with its owner and the default TTL where missing.
pub async fn tag_resource_group(
    client: &ArmClient,
    group: &ResourceGroup,
    policy: &TaggingPolicy,
) -> GroupTagging {
    let owner = if has_owner_email_tag(&group.tags) {
        TagAction::AlreadyTagged
    } else {
        match fetch_resource_group_creator(client, &group.name, policy.owner_lookback_days).await {
            None => TagAction::Skipped("creator not found in activity log".to_string()),
            Some(email) if policy.dry_run => TagAction::WouldTag(email),
            Some(email) => match add_owner_email_tag(client, &group.name, &email).await {
                Ok(_) => TagAction::Tagged(email),
                Err(e) => {
                    error!("Failed to tag owner of {}: {}", group.name, e);
                    TagAction::Failed(e.to_string())
                }
            },
        }
    };

    let ttl_value = policy.default_ttl_days.to_string();
    let ttl = if has_ttl_tag(&group.tags) {
        TagAction::AlreadyTagged
    } else if policy.dry_run {
        TagAction::WouldTag(ttl_value)
    } else {
        match add_ttl_tag(client, &group.name, policy.default_ttl_days).await {
            Ok(_) => TagAction::Tagged(ttl_value),
            Err(e) => {
                error!("Failed to tag TTL of {}: {}", group.name, e);
                TagAction::Failed(e.to_string())
            }
        }
    };

    GroupTagging {
        name: group.name.clone(),
        owner,
        ttl,
    }
}

/// Owner + TTL tagging pass over every resource group in the subscription.
pub async fn tag_resource_groups(client: &ArmClient, policy: &TaggingPolicy) -> Result<TaggingReport> {
    let groups = list_resource_groups(client).await?;
    let mut report = TaggingReport::default();
    for group in &groups {
        info!("Tagging resource group: {}", group.name);
        report.groups.push(tag_resource_group(client, group, policy).await);
    }
    info!(
        "Tagging pass finished: {} tag(s) written, {} failure(s)",
        report.tagged(),
        report.failures()
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiredGroup {
    pub name: String,
    pub owner: Option<String>,
    pub ttl_days: u32,
    pub created_time: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

fn is_protected(group: &ResourceGroup, protected_tag: &str) -> bool {
    group
        .tags
        .get(protected_tag)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Groups whose TTL, counted from creation, has elapsed by `now`.
///
/// Groups without a usable TTL tag or creation time, and protected groups,
/// never expire.
pub fn find_expired(groups: &[ResourceGroup], now: DateTime<Utc>, protected_tag: &str) -> Vec<ExpiredGroup> {
    groups
        .iter()
        .filter(|g| !is_protected(g, protected_tag))
        .filter_map(|g| {
            let ttl = ttl_days(&g.tags)?;
            let created = g.created_time?;
            // TTLs past chrono's range never expire
            let expired_at = created.checked_add_signed(Duration::days(i64::from(ttl)))?;
            (expired_at <= now).then(|| ExpiredGroup {
                name: g.name.clone(),
                owner: g.tags.get(OWNER_EMAIL_TAG).cloned(),
                ttl_days: ttl,
                created_time: created,
                expired_at,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub dry_run: bool,
    pub force: bool,
    pub protected_tag: String,
}

/// Cleanup operation result
#[derive(Debug, Default, Serialize)]
pub struct CleanupResult {
    pub expired: Vec<ExpiredGroup>,
    pub deleted: Vec<String>,
    pub skipped: Vec<(String, String)>, // (name, reason)
    pub errors: Vec<(String, String)>,  // (name, error)
}

/// Delete every expired resource group.
///
/// Dry runs and runs without `force` delete nothing; every expired group is
/// reported as skipped with the reason.
pub async fn cleanup_expired(client: &ArmClient, options: &CleanupOptions) -> Result<CleanupResult> {
    let groups = list_resource_groups(client).await?;
    let mut result = CleanupResult {
        expired: find_expired(&groups, Utc::now(), &options.protected_tag),
        ..Default::default()
    };

    for group in &result.expired {
        if options.dry_run {
            result.skipped.push((group.name.clone(), "dry run".to_string()));
            continue;
        }
        if !options.force {
            result
                .skipped
                .push((group.name.clone(), "confirmation required (use --force)".to_string()));
            continue;
        }
        match delete_resource_group(client, &group.name).await {
            Ok(true) => result.deleted.push(group.name.clone()),
            Ok(false) => result
                .skipped
                .push((group.name.clone(), "not deleted (missing or rejected)".to_string())),
            Err(e) => {
                error!("Failed to delete resource group {}: {}", group.name, e);
                result.errors.push((group.name.clone(), e.to_string()));
            }
        }
    }
    Ok(result)
}

/// Email each owner the list of their expired groups. Returns messages sent.
pub async fn notify_owners(
    mailer: &dyn Mailer,
    from: &str,
    sender_name: &str,
    expired: &[ExpiredGroup],
) -> Result<usize> {
    let mut by_owner: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for group in expired {
        match group.owner.as_deref() {
            Some(owner) => by_owner.entry(owner).or_default().push(group.name.clone()),
            None => warn!("Expired resource group {} has no owner to notify", group.name),
        }
    }

    let mut sent = 0;
    for (owner, groups) in by_owner {
        let receiver = owner.split('@').next().unwrap_or(owner);
        let message = EmailMessage {
            from: from.to_string(),
            to: vec![owner.to_string()],
            subject: UNUSED_RESOURCES_SUBJECT.to_string(),
            body: render_unused_resources_notice(receiver, sender_name, &groups),
        };
        mailer.send(&message).await?;
        sent += 1;
    }
    Ok(sent)
}
