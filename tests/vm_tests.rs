//! VM lookup and the delete cascade

mod common;

use azcostctl::azure::virtual_machines::{
    delete_vm, get_vm, list_vms, StepOutcome, COMPUTE_API_VERSION, DISK_API_VERSION,
    NETWORK_API_VERSION,
};
use azcostctl::error::AzcostError;
use common::{api_version, client, sub_path, ARM_500};
use mockito::{Matcher, ServerGuard};
use serde_json::json;

const VM: &str = "/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm1";
const NIC: &str = "/resourceGroups/rg-app/providers/Microsoft.Network/networkInterfaces/vm1-nic";
const DISK: &str = "/resourceGroups/rg-app/providers/Microsoft.Compute/disks/vm1-osdisk";
const PIP: &str = "/resourceGroups/rg-app/providers/Microsoft.Network/publicIPAddresses/vm1-ip";

fn vm_body() -> String {
    json!({
        "id": sub_path(VM),
        "name": "vm1",
        "location": "eastus",
        "properties": {
            "hardwareProfile": { "vmSize": "Standard_D4s_v3" },
            "storageProfile": { "osDisk": { "name": "vm1-osdisk", "managedDisk": { "id": sub_path(DISK) } } },
            "networkProfile": { "networkInterfaces": [ { "id": sub_path(NIC) } ] }
        }
    })
    .to_string()
}

fn nic_body(with_public_ip: bool) -> String {
    let ip = if with_public_ip {
        json!({ "id": sub_path(PIP) })
    } else {
        serde_json::Value::Null
    };
    json!({
        "id": sub_path(NIC),
        "properties": { "ipConfigurations": [ { "properties": { "publicIPAddress": ip } } ] }
    })
    .to_string()
}

async fn resource(
    server: &mut ServerGuard,
    method: &str,
    path: &str,
    version: &str,
    status: usize,
    body: String,
) -> mockito::Mock {
    server
        .mock(method, sub_path(path).as_str())
        .match_query(api_version(version))
        .with_status(status)
        .with_body(body)
        .create_async()
        .await
}

/// Mocks for GET and DELETE on `path` that must never be hit.
async fn untouched(server: &mut ServerGuard, path: &str) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for method in ["GET", "DELETE"] {
        mocks.push(
            server
                .mock(method, sub_path(path).as_str())
                .match_query(Matcher::Any)
                .expect(0)
                .create_async()
                .await,
        );
    }
    mocks
}

#[tokio::test]
async fn test_get_vm() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;

    let vm = get_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(vm.vm_size(), Some("Standard_D4s_v3"));
    assert_eq!(vm.primary_nic_id(), Some(sub_path(NIC).as_str()));
    assert_eq!(vm.os_disk_id(), Some(sub_path(DISK).as_str()));
}

#[tokio::test]
async fn test_get_vm_not_found() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 404, String::new()).await;

    let err = get_vm(&client(&server), "rg-app", "vm1").await.unwrap_err();
    assert!(matches!(err, AzcostError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_list_vms() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            sub_path("/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines").as_str(),
        )
        .match_query(api_version(COMPUTE_API_VERSION))
        .with_status(200)
        .with_body(format!(r#"{{"value":[{}]}}"#, vm_body()))
        .create_async()
        .await;

    let vms = list_vms(&client(&server), "rg-app").await.unwrap();
    assert_eq!(vms.len(), 1);
    assert_eq!(vms[0].name, "vm1");
}

#[tokio::test]
async fn test_list_vms_unknown_resource_group() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            sub_path("/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines").as_str(),
        )
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":"ResourceGroupNotFound","message":"Resource group 'rg-app' could not be found."}}"#)
        .create_async()
        .await;

    let err = list_vms(&client(&server), "rg-app").await.unwrap_err();
    assert!(
        matches!(err, AzcostError::ResourceNotFound { ref resource_type, ref name }
            if resource_type == "resource group" && name == "rg-app")
    );
}

#[tokio::test]
async fn test_delete_vm_full_cascade() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;
    let vm_delete = resource(&mut server, "DELETE", VM, COMPUTE_API_VERSION, 202, String::new()).await;
    resource(&mut server, "GET", NIC, NETWORK_API_VERSION, 200, nic_body(true)).await;
    let nic_delete = resource(&mut server, "DELETE", NIC, NETWORK_API_VERSION, 200, String::new()).await;
    resource(&mut server, "GET", DISK, DISK_API_VERSION, 200, "{}".to_string()).await;
    let disk_delete = resource(&mut server, "DELETE", DISK, DISK_API_VERSION, 202, String::new()).await;
    resource(&mut server, "GET", PIP, NETWORK_API_VERSION, 200, "{}".to_string()).await;
    let pip_delete = resource(&mut server, "DELETE", PIP, NETWORK_API_VERSION, 200, String::new()).await;

    let report = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(report.vm, StepOutcome::Deleted);
    assert_eq!(report.nic, StepOutcome::Deleted);
    assert_eq!(report.disk, StepOutcome::Deleted);
    assert_eq!(report.public_ip, StepOutcome::Deleted);
    assert!(report.completed());

    vm_delete.assert_async().await;
    nic_delete.assert_async().await;
    disk_delete.assert_async().await;
    pip_delete.assert_async().await;
}

#[tokio::test]
async fn test_delete_vm_without_public_ip() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;
    resource(&mut server, "DELETE", VM, COMPUTE_API_VERSION, 200, String::new()).await;
    resource(&mut server, "GET", NIC, NETWORK_API_VERSION, 200, nic_body(false)).await;
    resource(&mut server, "DELETE", NIC, NETWORK_API_VERSION, 200, String::new()).await;
    resource(&mut server, "GET", DISK, DISK_API_VERSION, 200, "{}".to_string()).await;
    resource(&mut server, "DELETE", DISK, DISK_API_VERSION, 200, String::new()).await;

    let report = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(report.public_ip, StepOutcome::NotPresent);
    assert!(report.completed());
}

#[tokio::test]
async fn test_delete_missing_vm_stops() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 404, String::new()).await;
    let any_delete = server
        .mock("DELETE", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let report = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(report.vm, StepOutcome::AlreadyGone);
    assert_eq!(report.nic, StepOutcome::NotAttempted);
    assert!(!report.completed());
    any_delete.assert_async().await;
}

#[tokio::test]
async fn test_delete_vm_with_vanished_nic_stops() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;
    let vm_delete = resource(&mut server, "DELETE", VM, COMPUTE_API_VERSION, 202, String::new()).await;
    resource(&mut server, "GET", NIC, NETWORK_API_VERSION, 404, String::new()).await;
    let disk_calls = untouched(&mut server, DISK).await;

    let report = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(report.vm, StepOutcome::Deleted);
    assert_eq!(report.nic, StepOutcome::AlreadyGone);
    assert_eq!(report.disk, StepOutcome::NotAttempted);
    assert_eq!(report.public_ip, StepOutcome::NotAttempted);
    assert!(!report.completed());
    vm_delete.assert_async().await;
    for mock in disk_calls {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_delete_vm_with_vanished_disk_stops() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;
    resource(&mut server, "DELETE", VM, COMPUTE_API_VERSION, 202, String::new()).await;
    resource(&mut server, "GET", NIC, NETWORK_API_VERSION, 200, nic_body(true)).await;
    resource(&mut server, "DELETE", NIC, NETWORK_API_VERSION, 200, String::new()).await;
    resource(&mut server, "GET", DISK, DISK_API_VERSION, 404, String::new()).await;
    let pip_calls = untouched(&mut server, PIP).await;

    let report = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap();
    assert_eq!(report.nic, StepOutcome::Deleted);
    assert_eq!(report.disk, StepOutcome::AlreadyGone);
    assert_eq!(report.public_ip, StepOutcome::NotAttempted);
    for mock in pip_calls {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_delete_vm_failure_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    resource(&mut server, "GET", VM, COMPUTE_API_VERSION, 200, vm_body()).await;
    resource(&mut server, "DELETE", VM, COMPUTE_API_VERSION, 500, ARM_500.to_string()).await;

    let err = delete_vm(&client(&server), "rg-app", "vm1").await.unwrap_err();
    assert!(matches!(err, AzcostError::Api { .. }));
}
