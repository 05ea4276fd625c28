use super::{mailer, print_json, OutputFormat};
use anyhow::Result;
use azcostctl::azure::owner::fetch_resource_group_creator;
use azcostctl::config::Config;
use azcostctl::governance::{
    cleanup_expired, notify_owners, tag_resource_groups, CleanupOptions, TagAction, TaggingPolicy,
};
use azcostctl::validation::{validate_resource_group_name, validate_ttl};
use azcostctl::ArmClient;
use comfy_table::{Cell, Color, Table};
use console::style;

fn action_cell(action: &TagAction) -> Cell {
    match action {
        TagAction::AlreadyTagged => Cell::new("already tagged"),
        TagAction::Tagged(v) => Cell::new(format!("tagged {}", v)).fg(Color::Green),
        TagAction::WouldTag(v) => Cell::new(format!("would tag {}", v)).fg(Color::Cyan),
        TagAction::Skipped(reason) => Cell::new(format!("skipped: {}", reason)).fg(Color::Yellow),
        TagAction::Failed(e) => Cell::new(format!("failed: {}", e)).fg(Color::Red),
    }
}

pub async fn run_tag(
    client: &ArmClient,
    config: &Config,
    dry_run: bool,
    ttl: Option<u32>,
    output: OutputFormat,
) -> Result<()> {
    let default_ttl_days = ttl.unwrap_or(config.tagging.default_ttl_days);
    validate_ttl(default_ttl_days)?;
    let policy = TaggingPolicy {
        default_ttl_days,
        owner_lookback_days: config.tagging.owner_lookback_days,
        dry_run,
    };

    let report = tag_resource_groups(client, &policy).await?;
    if output == OutputFormat::Json {
        return print_json(&report);
    }

    if dry_run {
        println!("[DRY RUN MODE - No tags will be written]");
    }
    if report.groups.is_empty() {
        println!("No resource groups found");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Resource group", "OwnerEmail", "TTL"]);
    for group in &report.groups {
        table.add_row(vec![
            Cell::new(&group.name),
            action_cell(&group.owner),
            action_cell(&group.ttl),
        ]);
    }
    println!("{table}");
    println!(
        "\n{} tag(s) written, {} failure(s)",
        report.tagged(),
        report.failures()
    );
    Ok(())
}

pub async fn run_owner(
    client: &ArmClient,
    config: &Config,
    name: &str,
    days: Option<i64>,
    output: OutputFormat,
) -> Result<()> {
    validate_resource_group_name(name)?;
    let lookback = days.unwrap_or(config.tagging.owner_lookback_days);
    let owner = fetch_resource_group_creator(client, name, lookback).await;
    if output == OutputFormat::Json {
        return print_json(&serde_json::json!({ "resource_group": name, "owner": owner }));
    }
    match owner {
        Some(email) => println!("{}", email),
        None => println!(
            "{} creator of {} not found in the last {} day(s)",
            style("!").yellow(),
            name,
            lookback
        ),
    }
    Ok(())
}

pub async fn run_cleanup(
    client: &ArmClient,
    config: &Config,
    dry_run: bool,
    force: bool,
    notify: bool,
    from: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    // sender must resolve before anything is deleted
    let notifier = if notify { Some(mailer(config, from)?) } else { None };

    let options = CleanupOptions {
        dry_run,
        force,
        protected_tag: config.tagging.protected_tag.clone(),
    };
    let result = cleanup_expired(client, &options).await?;

    let notified = match &notifier {
        Some((outbox, from)) => {
            notify_owners(outbox, from, &config.mail.sender_name, &result.expired).await?
        }
        None => 0,
    };

    if output == OutputFormat::Json {
        return print_json(&serde_json::json!({ "cleanup": result, "notified": notified }));
    }

    println!("{}", "=".repeat(80));
    println!("Expired Resource Group Cleanup");
    println!("{}", "=".repeat(80));
    if dry_run {
        println!("[DRY RUN MODE - No resources will be deleted]");
    }
    if result.expired.is_empty() {
        println!("No expired resource groups found");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Resource group", "Owner", "TTL", "Expired at"]);
    for group in &result.expired {
        table.add_row(vec![
            Cell::new(&group.name),
            Cell::new(group.owner.as_deref().unwrap_or("-")),
            Cell::new(format!("{}d", group.ttl_days)),
            Cell::new(group.expired_at.format("%Y-%m-%d %H:%M UTC")),
        ]);
    }
    println!("{table}");

    for name in &result.deleted {
        println!("{} deleted {}", style("✓").green(), name);
    }
    for (name, reason) in &result.skipped {
        println!("{} skipped {}: {}", style("-").yellow(), name, reason);
    }
    for (name, error) in &result.errors {
        println!("{} failed {}: {}", style("✗").red(), name, error);
    }
    if !dry_run && !force {
        println!("\nTo delete them:");
        println!("  azcostctl cleanup --dry-run  # Preview cleanup");
        println!("  azcostctl cleanup --force    # Delete expired groups");
    }
    if notify {
        println!("\nNotified {} owner(s)", notified);
    }
    Ok(())
}
