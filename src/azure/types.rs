//! Type definitions for Azure Resource Manager payloads
//!
//! Only the fields azcostctl reads are modelled; everything else in the ARM
//! responses is ignored. Missing fields default to empty values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

/// ARM sends `"tags": null` for untagged resources.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wrapper for ARM list responses (`{"value": [...], "nextLink": ...}`).
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Tags,
    /// Only present when listed with `$expand=createdTime`
    #[serde(rename = "createdTime", skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Tags,
    pub properties: VmProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmProperties {
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    pub network_profile: NetworkProfile,
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageProfile {
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OsDisk {
    pub name: Option<String>,
    pub managed_disk: Option<SubResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network_interfaces: Vec<SubResource>,
}

/// Reference to another ARM resource by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubResource {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    pub id: String,
    pub properties: NicProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NicProperties {
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpConfiguration {
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpConfigurationProperties {
    #[serde(rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
}

impl VirtualMachine {
    pub fn vm_size(&self) -> Option<&str> {
        self.properties.hardware_profile.vm_size.as_deref()
    }

    pub fn primary_nic_id(&self) -> Option<&str> {
        self.properties
            .network_profile
            .network_interfaces
            .first()
            .map(|nic| nic.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn os_disk_id(&self) -> Option<&str> {
        self.properties
            .storage_profile
            .os_disk
            .as_ref()
            .and_then(|d| d.managed_disk.as_ref())
            .map(|m| m.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

impl NetworkInterface {
    pub fn public_ip_id(&self) -> Option<&str> {
        self.properties
            .ip_configurations
            .first()
            .and_then(|c| c.properties.public_ip_address.as_ref())
            .map(|ip| ip.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Entry from the activity log (`eventtypes/management/values`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub caller: Option<String>,
    pub operation_name: Option<LocalizedValue>,
    pub resource_group_name: Option<String>,
    pub event_timestamp: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalizedValue {
    pub value: Option<String>,
    pub localized_value: Option<String>,
}

impl ActivityLogEntry {
    pub fn status_code(&self) -> Option<&str> {
        self.properties.get("statusCode").and_then(|v| v.as_str())
    }
}
