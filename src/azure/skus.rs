//! VM SKU catalogue for a region

use crate::client::ArmClient;
use crate::error::{require, AzcostError, Result};
use crate::store::MetricsStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::{null_as_default, ListResponse};

pub const API_VERSION: &str = "2021-07-01";
const VIRTUAL_MACHINES: &str = "virtualMachines";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmSku {
    pub resource_type: String,
    pub name: String,
    pub tier: Option<String>,
    pub size: Option<String>,
    pub family: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub locations: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub capabilities: Vec<SkuCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkuCapability {
    pub name: String,
    pub value: String,
}

impl VmSku {
    pub fn capability(&self, name: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn vcpus(&self) -> Option<u32> {
        self.capability("vCPUs").and_then(|v| v.parse().ok())
    }

    pub fn memory_gb(&self) -> Option<f64> {
        self.capability("MemoryGB").and_then(|v| v.parse().ok())
    }
}

/// VM SKUs offered in `location`.
pub async fn list_vm_skus(client: &ArmClient, location: &str) -> Result<Vec<VmSku>> {
    require("location", location)?;
    let url = client.subscription_url("/providers/Microsoft.Compute/skus");
    let filter = format!("location eq '{}'", location);
    let response = client
        .get_typed::<ListResponse<VmSku>>(
            &url,
            &[("api-version", API_VERSION), ("$filter", filter.as_str())],
        )
        .await?
        .ok_or_else(|| AzcostError::not_found("subscription", client.subscription_id()))?;

    let skus: Vec<VmSku> = response
        .value
        .into_iter()
        .filter(|s| s.resource_type == VIRTUAL_MACHINES)
        .collect();
    info!("{} VM SKU(s) available in {}", skus.len(), location);
    Ok(skus)
}

/// Persist the catalogue so recommendations can run offline.
pub async fn add_vm_skus_to_db(store: &MetricsStore, skus: &[VmSku]) -> Result<usize> {
    let mut saved = 0;
    for sku in skus {
        store.upsert_sku(sku).await?;
        saved += 1;
    }
    info!("Saved {} VM SKU(s)", saved);
    Ok(saved)
}
