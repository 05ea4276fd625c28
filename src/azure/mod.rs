//! Azure Resource Manager operations
//!
//! Each submodule wraps one family of management API calls. All of them take
//! an `ArmClient` and are stateless otherwise.

pub mod metrics;
pub mod owner;
pub mod resource_groups;
pub mod skus;
pub mod tags;
pub mod types;
pub mod virtual_machines;

pub use metrics::{fetch_vm_consumption, ConsumptionData, MetricSummary};
pub use owner::fetch_resource_group_creator;
pub use resource_groups::{delete_resource_group, get_resource_group, list_resource_groups};
pub use skus::{list_vm_skus, VmSku};
pub use tags::{add_owner_email_tag, add_ttl_tag, apply_tags, get_tags, TagChange};
pub use types::{ResourceGroup, Tags, VirtualMachine};
pub use virtual_machines::{delete_vm, get_vm, VmDeletionReport};
