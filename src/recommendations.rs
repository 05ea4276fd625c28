//! VM right-sizing recommendations
//!
//! A VM is a downsize candidate when its average CPU over the metrics window
//! stays under a threshold. The suggested size is the smallest SKU of the
//! same family that still runs the observed CPU load at the target level and
//! holds the observed peak memory with headroom.

use crate::azure::metrics::{ConsumptionData, AVAILABLE_MEMORY_BYTES};
use crate::azure::skus::VmSku;
use crate::config::RecommendationConfig;
use crate::error::{AzcostError, Result};
use crate::mailer::{EmailMessage, Mailer};
use crate::utils::format_bytes;
use serde::Serialize;
use tracing::{debug, info};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub cpu_threshold_percent: f64,
    pub target_cpu_percent: f64,
    pub memory_headroom: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_threshold_percent: 20.0,
            target_cpu_percent: 60.0,
            memory_headroom: 1.25,
        }
    }
}

impl From<&RecommendationConfig> for Thresholds {
    fn from(cfg: &RecommendationConfig) -> Self {
        Self {
            cpu_threshold_percent: cfg.cpu_threshold_percent,
            target_cpu_percent: cfg.target_cpu_percent,
            memory_headroom: cfg.memory_headroom,
        }
    }
}

/// Peak memory in use, GiB: total minus the lowest available reading.
pub fn used_memory_gb(data: &ConsumptionData, total_gb: f64) -> Option<f64> {
    data.get(AVAILABLE_MEMORY_BYTES)
        .map(|s| (total_gb - s.bottom / GIB).max(0.0))
}

/// Suggest a smaller SKU for a VM, or `None` when it should stay as it is.
pub fn analyze_vm_consumption(
    data: &ConsumptionData,
    current: &VmSku,
    candidates: &[VmSku],
    thresholds: &Thresholds,
) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let cpu = data.cpu_average()?;
    if cpu >= thresholds.cpu_threshold_percent {
        debug!("{}: average CPU {:.1}% leaves no room to shrink", current.name, cpu);
        return None;
    }
    let current_vcpus = current.vcpus()?;
    let current_memory = current.memory_gb()?;

    let required_vcpus =
        ((current_vcpus as f64 * cpu / thresholds.target_cpu_percent).ceil() as u32).max(1);
    let required_memory = used_memory_gb(data, current_memory).unwrap_or(current_memory)
        * thresholds.memory_headroom;

    candidates
        .iter()
        .filter(|c| c.name != current.name && c.family.is_some() && c.family == current.family)
        .filter_map(|c| Some((c, c.vcpus()?, c.memory_gb()?)))
        .filter(|(_, vcpus, memory)| {
            *vcpus < current_vcpus && *vcpus >= required_vcpus && *memory >= required_memory
        })
        .min_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.2.total_cmp(&b.2))
                .then_with(|| a.0.name.cmp(&b.0.name))
        })
        .map(|(c, _, _)| c.name.clone())
}

/// Everything the recommendation email reports about one VM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub name: String,
    pub current_size: String,
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    /// Data disk read + write, bytes/sec
    pub storage_utilization: Option<f64>,
    /// Network in + out over the window, bytes
    pub network_utilization: Option<f64>,
    pub new_size: String,
}

impl Recommendation {
    pub fn new(
        name: &str,
        current: &VmSku,
        data: &ConsumptionData,
        new_size: &str,
    ) -> Self {
        let memory_utilization = current.memory_gb().and_then(|total| {
            data.available_memory_bytes()
                .map(|avail| ((1.0 - avail / GIB / total) * 100.0).clamp(0.0, 100.0))
        });
        Self {
            name: name.to_string(),
            current_size: current.name.clone(),
            cpu_utilization: data.cpu_average(),
            memory_utilization,
            storage_utilization: data.disk_bytes_per_sec(),
            network_utilization: data.network_bytes(),
            new_size: new_size.to_string(),
        }
    }
}

fn percent(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}%", v)).unwrap_or_else(|| "n/a".to_string())
}

pub fn recommendation_subject(rec: &Recommendation) -> String {
    format!("Resource Optimization Suggestion | {}", rec.name)
}

pub fn render_recommendation_email(rec: &Recommendation, window_days: i64) -> String {
    let storage = rec
        .storage_utilization
        .map(|b| format!("{}/s", format_bytes(b)))
        .unwrap_or_else(|| "n/a".to_string());
    let network = rec
        .network_utilization
        .map(format_bytes)
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Dear User,\n\
         \n\
         Our review of resource usage shows that the virtual machine {name} is larger than its \
         workload needs. Changing its size would lower its cost.\n\
         \n\
         Current VM size: {current}\n\
         Average CPU utilization over the past {days} day(s): {cpu}\n\
         Average memory utilization over the past {days} day(s): {memory}\n\
         Average data disk throughput over the past {days} day(s): {storage}\n\
         Total network traffic over the past {days} day(s): {network}\n\
         \n\
         Based on these metrics we suggest resizing the VM to {new_size}.\n\
         \n\
         If no action is taken within the next 3 days, the VM may be resized to the suggested \
         size to reduce costs.\n\
         \n\
         Thank you for your attention to this matter.\n\
         \n\
         Best regards,\n\
         Resource Optimization Team\n",
        name = rec.name,
        current = rec.current_size,
        days = window_days,
        cpu = percent(rec.cpu_utilization),
        memory = percent(rec.memory_utilization),
        storage = storage,
        network = network,
        new_size = rec.new_size,
    )
}

/// Validate, render and send the recommendation for one VM.
pub async fn send_recommendation_email(
    mailer: &dyn Mailer,
    from: &str,
    to: &[String],
    rec: &Recommendation,
    window_days: i64,
) -> Result<EmailMessage> {
    if to.is_empty() || to.iter().any(|addr| addr.trim().is_empty()) {
        return Err(AzcostError::validation(
            "to",
            "recipient email(s) is missing or invalid",
        ));
    }
    let message = EmailMessage {
        from: from.to_string(),
        to: to.iter().map(|s| s.trim().to_string()).collect(),
        subject: recommendation_subject(rec),
        body: render_recommendation_email(rec, window_days),
    };
    message.validate()?;
    mailer.send(&message).await?;
    info!("Sent sizing recommendation for {} to {}", rec.name, message.to.join(", "));
    Ok(message)
}
