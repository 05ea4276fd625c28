//! Virtual machine lookup and cascading deletion
//!
//! Deleting a VM in Azure leaves its NIC, OS disk and public IP behind. The
//! cascade here removes them in a fixed order: VM, NIC, disk, public IP. Each
//! dependent is checked for existence before it is deleted; the first one
//! found missing stops the cascade and later steps stay `NotAttempted`. There
//! is no rollback; a failure part-way leaves the earlier deletions in place.

use crate::client::ArmClient;
use crate::error::{require, AzcostError, Result};
use serde::Serialize;
use tracing::{info, warn};

use super::types::{ListResponse, NetworkInterface, VirtualMachine};

pub const COMPUTE_API_VERSION: &str = "2020-06-01";
pub const DISK_API_VERSION: &str = "2020-06-30";
pub const NETWORK_API_VERSION: &str = "2020-06-01";

/// What happened to one resource in the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Deleted,
    /// The resource was referenced but no longer exists
    AlreadyGone,
    /// The VM does not reference this kind of resource
    NotPresent,
    /// An earlier step made this one impossible
    NotAttempted,
}

#[derive(Debug, Clone, Serialize)]
pub struct VmDeletionReport {
    pub vm_name: String,
    pub vm: StepOutcome,
    pub nic: StepOutcome,
    pub disk: StepOutcome,
    pub public_ip: StepOutcome,
}

impl VmDeletionReport {
    fn new(vm_name: &str) -> Self {
        Self {
            vm_name: vm_name.to_string(),
            vm: StepOutcome::NotAttempted,
            nic: StepOutcome::NotAttempted,
            disk: StepOutcome::NotAttempted,
            public_ip: StepOutcome::NotAttempted,
        }
    }

    /// True when the VM and every dependent it referenced were deleted by this run.
    pub fn completed(&self) -> bool {
        let done = |o: StepOutcome| matches!(o, StepOutcome::Deleted | StepOutcome::NotPresent);
        self.vm == StepOutcome::Deleted && done(self.nic) && done(self.disk) && done(self.public_ip)
    }
}

fn vm_url(client: &ArmClient, resource_group: &str, vm_name: &str) -> String {
    client.subscription_url(&format!(
        "/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
        resource_group, vm_name
    ))
}

pub async fn get_vm(client: &ArmClient, resource_group: &str, vm_name: &str) -> Result<VirtualMachine> {
    require("resource_group", resource_group)?;
    require("vm_name", vm_name)?;
    client
        .get_typed(
            &vm_url(client, resource_group, vm_name),
            &[("api-version", COMPUTE_API_VERSION)],
        )
        .await?
        .ok_or_else(|| {
            AzcostError::not_found(
                "virtual machine",
                format!("{} (resource group {})", vm_name, resource_group),
            )
        })
}

pub async fn list_vms(client: &ArmClient, resource_group: &str) -> Result<Vec<VirtualMachine>> {
    require("resource_group", resource_group)?;
    let url = client.subscription_url(&format!(
        "/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines",
        resource_group
    ));
    let response = client
        .get_typed::<ListResponse<VirtualMachine>>(&url, &[("api-version", COMPUTE_API_VERSION)])
        .await?
        .ok_or_else(|| AzcostError::not_found("resource group", resource_group))?;
    Ok(response.value)
}

/// Check-then-delete for a dependent resource addressed by its full id.
async fn delete_dependent(
    client: &ArmClient,
    kind: &str,
    resource_id: &str,
    api_version: &str,
) -> Result<StepOutcome> {
    let url = client.resource_url(resource_id);
    let query = [("api-version", api_version)];
    if !client.exists(&url, &query).await? {
        warn!("{} {} is already deleted", kind, resource_id);
        return Ok(StepOutcome::AlreadyGone);
    }
    client.delete(&url, &query).await?;
    info!("Deleted {} {}", kind, resource_id);
    Ok(StepOutcome::Deleted)
}

/// Delete a VM and its NIC, OS disk and public IP.
pub async fn delete_vm(client: &ArmClient, resource_group: &str, vm_name: &str) -> Result<VmDeletionReport> {
    require("resource_group", resource_group)?;
    require("vm_name", vm_name)?;
    let mut report = VmDeletionReport::new(vm_name);

    let url = vm_url(client, resource_group, vm_name);
    let query = [("api-version", COMPUTE_API_VERSION)];
    let Some(vm) = client.get_typed::<VirtualMachine>(&url, &query).await? else {
        warn!("VM {} not found in resource group {}", vm_name, resource_group);
        report.vm = StepOutcome::AlreadyGone;
        return Ok(report);
    };
    let nic_id = vm.primary_nic_id().map(str::to_string);
    let disk_id = vm.os_disk_id().map(str::to_string);

    client.delete(&url, &query).await?;
    report.vm = StepOutcome::Deleted;
    info!("Deleted VM {}", vm_name);

    // The public IP hangs off the NIC, so it has to be read before the NIC goes.
    let mut public_ip_id = None;
    match nic_id {
        Some(nic_id) => {
            let nic_url = client.resource_url(&nic_id);
            let nic_query = [("api-version", NETWORK_API_VERSION)];
            let Some(nic) = client.get_typed::<NetworkInterface>(&nic_url, &nic_query).await? else {
                warn!("Network interface for {} is already deleted", vm_name);
                report.nic = StepOutcome::AlreadyGone;
                return Ok(report);
            };
            public_ip_id = nic.public_ip_id().map(str::to_string);
            client.delete(&nic_url, &nic_query).await?;
            info!("Deleted network interface {}", nic_id);
            report.nic = StepOutcome::Deleted;
        }
        None => report.nic = StepOutcome::NotPresent,
    }

    report.disk = match disk_id {
        Some(disk_id) => delete_dependent(client, "disk", &disk_id, DISK_API_VERSION).await?,
        None => StepOutcome::NotPresent,
    };
    if report.disk == StepOutcome::AlreadyGone {
        return Ok(report);
    }

    report.public_ip = match public_ip_id {
        Some(ip_id) => delete_dependent(client, "public IP", &ip_id, NETWORK_API_VERSION).await?,
        None => StepOutcome::NotPresent,
    };

    if report.completed() {
        info!("VM {} and dependent resources deleted", vm_name);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_completed() {
        let mut report = VmDeletionReport::new("vm1");
        assert!(!report.completed());
        report.vm = StepOutcome::Deleted;
        report.nic = StepOutcome::Deleted;
        report.disk = StepOutcome::Deleted;
        report.public_ip = StepOutcome::NotPresent;
        assert!(report.completed());
        report.disk = StepOutcome::AlreadyGone;
        assert!(!report.completed());
    }
}
