use super::{print_json, OutputFormat};
use anyhow::Result;
use azcostctl::azure::types::VirtualMachine;
use azcostctl::azure::virtual_machines::{delete_vm, get_vm, list_vms, StepOutcome};
use azcostctl::validation::validate_resource_group_name;
use azcostctl::ArmClient;
use clap::Subcommand;
use comfy_table::{Cell, Color, Table};
use console::style;

#[derive(Subcommand, Clone)]
pub enum VmCommands {
    /// Show one virtual machine
    Show { resource_group: String, name: String },
    /// List virtual machines in a resource group
    List { resource_group: String },
    /// Delete a VM with its NIC, OS disk and public IP
    Delete {
        resource_group: String,
        name: String,
        /// Actually delete (without it nothing is deleted)
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_command(cmd: VmCommands, client: &ArmClient, output: OutputFormat) -> Result<()> {
    match cmd {
        VmCommands::Show { resource_group, name } => {
            validate_resource_group_name(&resource_group)?;
            let vm = get_vm(client, &resource_group, &name).await?;
            if output == OutputFormat::Json {
                return print_json(&vm);
            }
            display_vms(std::slice::from_ref(&vm));
        }
        VmCommands::List { resource_group } => {
            validate_resource_group_name(&resource_group)?;
            let vms = list_vms(client, &resource_group).await?;
            if output == OutputFormat::Json {
                return print_json(&vms);
            }
            if vms.is_empty() {
                println!("No virtual machines in {}", resource_group);
            } else {
                display_vms(&vms);
            }
        }
        VmCommands::Delete {
            resource_group,
            name,
            force,
        } => {
            validate_resource_group_name(&resource_group)?;
            if !force {
                println!("VM {} was not deleted.", name);
                println!(
                    "  azcostctl vm delete {} {} --force    # Delete it and its NIC, disk and public IP",
                    resource_group, name
                );
                return Ok(());
            }
            let report = delete_vm(client, &resource_group, &name).await?;
            if output == OutputFormat::Json {
                return print_json(&report);
            }
            let mut table = Table::new();
            table.set_header(vec!["Resource", "Outcome"]);
            for (kind, outcome) in [
                ("VM", report.vm),
                ("NIC", report.nic),
                ("OS disk", report.disk),
                ("Public IP", report.public_ip),
            ] {
                table.add_row(vec![Cell::new(kind), outcome_cell(outcome)]);
            }
            println!("{table}");
            if report.completed() {
                println!("{} {} and its dependents deleted", style("✓").green(), name);
            } else {
                println!("{} deletion of {} was partial", style("!").yellow(), name);
            }
        }
    }
    Ok(())
}

fn outcome_cell(outcome: StepOutcome) -> Cell {
    match outcome {
        StepOutcome::Deleted => Cell::new("deleted").fg(Color::Green),
        StepOutcome::AlreadyGone => Cell::new("already gone").fg(Color::Yellow),
        StepOutcome::NotPresent => Cell::new("none"),
        StepOutcome::NotAttempted => Cell::new("not attempted").fg(Color::Red),
    }
}

fn display_vms(vms: &[VirtualMachine]) {
    let mut table = Table::new();
    table.set_header(vec!["Name", "Location", "Size", "NIC", "OS disk"]);
    let last_segment = |id: Option<&str>| {
        id.and_then(|i| i.rsplit('/').next())
            .unwrap_or("-")
            .to_string()
    };
    for vm in vms {
        table.add_row(vec![
            Cell::new(&vm.name),
            Cell::new(&vm.location),
            Cell::new(vm.vm_size().unwrap_or("-")),
            Cell::new(last_segment(vm.primary_nic_id())),
            Cell::new(last_segment(vm.os_disk_id())),
        ]);
    }
    println!("{table}");
}
