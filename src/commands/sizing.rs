//! `skus`, `metrics` and `recommend`

use super::{mailer, print_json, OutputFormat};
use anyhow::Result;
use azcostctl::azure::metrics::{fetch_vm_consumption, ConsumptionData, PERCENTAGE_CPU};
use azcostctl::azure::skus::{add_vm_skus_to_db, list_vm_skus, VmSku};
use azcostctl::azure::virtual_machines::get_vm;
use azcostctl::config::Config;
use azcostctl::error::AzcostError;
use azcostctl::recommendations::{
    analyze_vm_consumption, send_recommendation_email, Recommendation, Thresholds,
};
use azcostctl::store::{MetricsRecord, MetricsStore};
use azcostctl::utils::format_bytes;
use azcostctl::validation::validate_resource_group_name;
use azcostctl::ArmClient;
use comfy_table::{Cell, Table};
use console::style;
use tracing::info;

pub async fn run_skus(
    client: &ArmClient,
    config: &Config,
    location: &str,
    save: bool,
    output: OutputFormat,
) -> Result<()> {
    let skus = list_vm_skus(client, location).await?;
    if save {
        let store = MetricsStore::open(&config.metrics.database).await?;
        let saved = add_vm_skus_to_db(&store, &skus).await?;
        if output == OutputFormat::Text {
            println!("Saved {} SKU(s) to {}", saved, config.metrics.database.display());
        }
    }
    if output == OutputFormat::Json {
        return print_json(&skus);
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Family", "Tier", "vCPUs", "Memory (GB)"]);
    for sku in &skus {
        table.add_row(vec![
            Cell::new(&sku.name),
            Cell::new(sku.family.as_deref().unwrap_or("-")),
            Cell::new(sku.tier.as_deref().unwrap_or("-")),
            Cell::new(sku.vcpus().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(sku.memory_gb().map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())),
        ]);
    }
    println!("{table}");
    println!("\n{} VM SKU(s) in {}", skus.len(), location);
    Ok(())
}

fn window(config: &Config, days: Option<i64>) -> Result<i64> {
    let days = days.unwrap_or(config.metrics.window_days);
    if days < 1 {
        return Err(AzcostError::validation("days", "must be at least 1").into());
    }
    Ok(days)
}

fn display_consumption(data: &ConsumptionData) {
    if data.is_empty() {
        println!("No metric data in the window");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Aggregation", "Value", "Peak", "Bottom", "Samples"]);
    for (name, summary) in &data.metrics {
        let fmt = |v: f64| {
            if name == PERCENTAGE_CPU {
                format!("{:.1}%", v)
            } else {
                format_bytes(v)
            }
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(summary.aggregation.as_str()),
            Cell::new(fmt(summary.value)),
            Cell::new(fmt(summary.peak)),
            Cell::new(fmt(summary.bottom)),
            Cell::new(summary.samples),
        ]);
    }
    println!("{table}");
}

pub async fn run_metrics(
    client: &ArmClient,
    config: &Config,
    resource_group: &str,
    vm_name: &str,
    days: Option<i64>,
    save: bool,
    output: OutputFormat,
) -> Result<()> {
    validate_resource_group_name(resource_group)?;
    let days = window(config, days)?;
    let vm = get_vm(client, resource_group, vm_name).await?;
    let data = fetch_vm_consumption(client, resource_group, vm_name, days).await?;

    if save {
        let store = MetricsStore::open(&config.metrics.database).await?;
        let id = store
            .insert(&MetricsRecord::for_vm(vm_name, vm.vm_size(), &data, None))
            .await?;
        info!("Stored metrics snapshot {} for {}", id, vm_name);
    }
    if output == OutputFormat::Json {
        return print_json(&data);
    }
    println!(
        "{} ({}) over the last {} day(s)",
        style(vm_name).bold().cyan(),
        vm.vm_size().unwrap_or("unknown size"),
        days
    );
    display_consumption(&data);
    Ok(())
}

fn offered_in(sku: &VmSku, location: &str) -> bool {
    sku.locations.iter().any(|l| l.eq_ignore_ascii_case(location))
}

/// SKUs offered where the VM runs: the stored catalogue, or a fresh listing saved for next time.
async fn catalogue_for(client: &ArmClient, store: &MetricsStore, location: &str) -> Result<Vec<VmSku>> {
    let stored: Vec<VmSku> = store
        .load_skus()
        .await?
        .into_iter()
        .filter(|s| offered_in(s, location))
        .collect();
    if !stored.is_empty() {
        return Ok(stored);
    }
    let skus = list_vm_skus(client, location).await?;
    add_vm_skus_to_db(store, &skus).await?;
    Ok(skus)
}

pub struct RecommendArgs {
    pub resource_group: String,
    pub vm_name: String,
    pub to: Vec<String>,
    pub from: Option<String>,
    pub days: Option<i64>,
}

pub async fn run_recommend(
    client: &ArmClient,
    config: &Config,
    args: RecommendArgs,
    output: OutputFormat,
) -> Result<()> {
    validate_resource_group_name(&args.resource_group)?;
    let days = window(config, args.days)?;
    let vm = get_vm(client, &args.resource_group, &args.vm_name).await?;
    let size = vm
        .vm_size()
        .ok_or_else(|| AzcostError::validation("vm_size", "VM reports no hardware profile"))?
        .to_string();

    let store = MetricsStore::open(&config.metrics.database).await?;
    let candidates = catalogue_for(client, &store, &vm.location).await?;
    let current = candidates
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(&size))
        .cloned()
        .ok_or_else(|| AzcostError::not_found("VM SKU", size.as_str()))?;

    let data = fetch_vm_consumption(client, &args.resource_group, &args.vm_name, days).await?;
    let thresholds = Thresholds::from(&config.recommendations);
    let suggestion = analyze_vm_consumption(&data, &current, &candidates, &thresholds);
    store
        .insert(&MetricsRecord::for_vm(
            &args.vm_name,
            Some(&size),
            &data,
            suggestion.as_deref(),
        ))
        .await?;

    let recommendation = suggestion
        .as_deref()
        .map(|new_size| Recommendation::new(&args.vm_name, &current, &data, new_size));

    let mut emailed = Vec::new();
    if let Some(rec) = &recommendation {
        if !args.to.is_empty() {
            let (outbox, from) = mailer(config, args.from)?;
            let message = send_recommendation_email(&outbox, &from, &args.to, rec, days).await?;
            emailed = message.to;
        }
    }

    if output == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "vm": args.vm_name,
            "current_size": size,
            "recommendation": recommendation,
            "emailed_to": emailed,
        }));
    }

    display_consumption(&data);
    match &recommendation {
        None => println!(
            "\n{} {} ({}) should keep its size",
            style("✓").green(),
            args.vm_name,
            size
        ),
        Some(rec) => {
            println!(
                "\n{} resize {} from {} to {}",
                style("→").cyan().bold(),
                rec.name,
                rec.current_size,
                style(&rec.new_size).bold()
            );
            if !emailed.is_empty() {
                println!("Recommendation sent to {}", emailed.join(", "));
            }
        }
    }
    Ok(())
}
