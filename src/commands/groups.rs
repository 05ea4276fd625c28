use super::{print_json, OutputFormat};
use anyhow::Result;
use azcostctl::azure::resource_groups::{delete_resource_group, get_resource_group, list_resource_groups};
use azcostctl::azure::tags::{apply_tags, delete_tag, get_tags, OWNER_EMAIL_TAG, TTL_TAG};
use azcostctl::azure::types::{ResourceGroup, Tags};
use azcostctl::config::Config;
use azcostctl::error::AzcostError;
use azcostctl::governance::find_expired;
use azcostctl::utils::format_age;
use azcostctl::validation::validate_resource_group_name;
use azcostctl::ArmClient;
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{Cell, Color, Table};
use console::style;

#[derive(Subcommand, Clone)]
pub enum GroupCommands {
    /// List resource groups with owner, TTL and age
    List,
    /// Show one resource group
    Show { name: String },
    /// Delete a resource group
    Delete {
        name: String,
        /// Actually delete (without it nothing is deleted)
        #[arg(short, long)]
        force: bool,
    },
    /// Show the tags of a resource group, merging in KEY=VALUE pairs first
    Tags {
        name: String,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_tag)]
        set: Vec<(String, String)>,
    },
    /// Remove one tag from a resource group
    Untag { name: String, key: String },
}

fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

pub async fn handle_command(
    cmd: GroupCommands,
    client: &ArmClient,
    config: &Config,
    output: OutputFormat,
) -> Result<()> {
    match cmd {
        GroupCommands::List => {
            let groups = list_resource_groups(client).await?;
            if output == OutputFormat::Json {
                return print_json(&groups);
            }
            display_groups(&groups, &config.tagging.protected_tag);
        }
        GroupCommands::Show { name } => {
            validate_resource_group_name(&name)?;
            let group = get_resource_group(client, &name)
                .await?
                .ok_or_else(|| AzcostError::not_found("resource group", name.as_str()))?;
            if output == OutputFormat::Json {
                return print_json(&group);
            }
            println!("{}", style(&group.name).bold().cyan());
            println!("  id:       {}", group.id);
            println!("  location: {}", group.location);
            println!("  age:      {}", format_age(group.created_time, Utc::now()));
            print_tags(&group.tags);
        }
        GroupCommands::Delete { name, force } => {
            validate_resource_group_name(&name)?;
            if !force {
                println!("Resource group {} was not deleted.", name);
                println!("  azcostctl groups delete {} --force    # Delete it", name);
                return Ok(());
            }
            let deleted = delete_resource_group(client, &name).await?;
            if output == OutputFormat::Json {
                return print_json(&serde_json::json!({ "name": name, "deleted": deleted }));
            }
            if deleted {
                println!("{} deletion of {} accepted", style("✓").green(), name);
            } else {
                println!("{} {} was not deleted (missing or rejected)", style("!").yellow(), name);
            }
        }
        GroupCommands::Tags { name, set } => {
            validate_resource_group_name(&name)?;
            let tags = if set.is_empty() {
                get_tags(client, &name).await?
            } else {
                let updates: Tags = set.into_iter().collect();
                let change = apply_tags(client, &name, &updates).await?;
                if !change.was_written() {
                    println!("Tags already up to date");
                }
                get_tags(client, &name).await?
            };
            if output == OutputFormat::Json {
                return print_json(&tags);
            }
            print_tags(&tags);
        }
        GroupCommands::Untag { name, key } => {
            validate_resource_group_name(&name)?;
            let change = delete_tag(client, &name, &key).await?;
            if change.was_written() {
                println!("Removed tag {} from {}", key, name);
            } else {
                println!("{} has no tag {}", name, key);
            }
        }
    }
    Ok(())
}

fn print_tags(tags: &Tags) {
    if tags.is_empty() {
        println!("  (no tags)");
        return;
    }
    for (k, v) in tags {
        println!("  {} = {}", style(k).bold(), v);
    }
}

fn display_groups(groups: &[ResourceGroup], protected_tag: &str) {
    if groups.is_empty() {
        println!("No resource groups found");
        return;
    }
    let now = Utc::now();
    let expired: Vec<String> = find_expired(groups, now, protected_tag)
        .into_iter()
        .map(|g| g.name)
        .collect();

    let mut table = Table::new();
    table.set_header(vec!["Name", "Location", "Owner", "TTL", "Age", "Status"]);
    for group in groups {
        let protected = group
            .tags
            .get(protected_tag)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let status = if protected {
            Cell::new("protected").fg(Color::Cyan)
        } else if expired.contains(&group.name) {
            Cell::new("expired").fg(Color::Red)
        } else if !group.tags.contains_key(OWNER_EMAIL_TAG) || !group.tags.contains_key(TTL_TAG) {
            Cell::new("untagged").fg(Color::Yellow)
        } else {
            Cell::new("ok").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&group.name),
            Cell::new(&group.location),
            Cell::new(group.tags.get(OWNER_EMAIL_TAG).map(String::as_str).unwrap_or("-")),
            Cell::new(group.tags.get(TTL_TAG).map(String::as_str).unwrap_or("-")),
            Cell::new(format_age(group.created_time, now)),
            status,
        ]);
    }
    println!("{table}");
    println!("\n{} resource group(s), {} expired", groups.len(), expired.len());
}
