//! VM utilization metrics from Azure Monitor
//!
//! Six platform metrics are collected over a trailing window. Gauges are
//! averaged across the data points; counters are summed.

use crate::client::ArmClient;
use crate::error::{require, AzcostError, Result};
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::types::null_as_default;

pub const API_VERSION: &str = "2018-01-01";

pub const PERCENTAGE_CPU: &str = "Percentage CPU";
pub const AVAILABLE_MEMORY_BYTES: &str = "Available Memory Bytes";
pub const DISK_READ_BYTES: &str = "Data Disk Read Bytes/sec";
pub const DISK_WRITE_BYTES: &str = "Data Disk Write Bytes/sec";
pub const NETWORK_IN_TOTAL: &str = "Network In Total";
pub const NETWORK_OUT_TOTAL: &str = "Network Out Total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Average,
    Total,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Average => "Average",
            Aggregation::Total => "Total",
        }
    }

    fn pick(&self, point: &DataPoint) -> Option<f64> {
        match self {
            Aggregation::Average => point.average,
            Aggregation::Total => point.total,
        }
    }
}

/// Metrics collected for every VM, with the aggregation each one uses.
pub const VM_METRICS: [(&str, Aggregation); 6] = [
    (PERCENTAGE_CPU, Aggregation::Average),
    (AVAILABLE_MEMORY_BYTES, Aggregation::Average),
    (DISK_READ_BYTES, Aggregation::Average),
    (DISK_WRITE_BYTES, Aggregation::Average),
    (NETWORK_IN_TOTAL, Aggregation::Total),
    (NETWORK_OUT_TOTAL, Aggregation::Total),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataPoint {
    pub time_stamp: Option<String>,
    pub average: Option<f64>,
    pub total: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetricsResponse {
    #[serde(deserialize_with = "null_as_default")]
    value: Vec<Metric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Metric {
    #[serde(deserialize_with = "null_as_default")]
    timeseries: Vec<TimeSeries>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeSeries {
    #[serde(deserialize_with = "null_as_default")]
    data: Vec<DataPoint>,
}

/// Aggregate of one metric over the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub aggregation: Aggregation,
    /// Mean over all points for `Average` metrics, sum for `Total` metrics
    pub value: f64,
    pub peak: f64,
    pub bottom: f64,
    /// Data points that carried a value
    pub samples: usize,
}

/// Summarize the data points of one metric.
///
/// Averages are taken over every point in the window, totals over the points
/// that carry a value. A series with no values at all yields `None`.
pub fn summarize(points: &[DataPoint], aggregation: Aggregation) -> Option<MetricSummary> {
    let values: Vec<f64> = points.iter().filter_map(|p| aggregation.pick(p)).collect();
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    let value = match aggregation {
        // empty hours count towards the mean as zero
        Aggregation::Average => sum / points.len() as f64,
        Aggregation::Total => sum,
    };
    let peak = values.iter().copied().fold(f64::MIN, f64::max);
    let bottom = values.iter().copied().fold(f64::MAX, f64::min);
    Some(MetricSummary {
        aggregation,
        value,
        peak,
        bottom,
        samples: values.len(),
    })
}

/// Metric name to summary; metrics without data are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionData {
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl ConsumptionData {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn get(&self, metric: &str) -> Option<&MetricSummary> {
        self.metrics.get(metric)
    }

    pub fn insert(&mut self, metric: &str, summary: MetricSummary) {
        self.metrics.insert(metric.to_string(), summary);
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        self.get(metric).map(|s| s.value)
    }

    pub fn cpu_average(&self) -> Option<f64> {
        self.value(PERCENTAGE_CPU)
    }

    pub fn available_memory_bytes(&self) -> Option<f64> {
        self.value(AVAILABLE_MEMORY_BYTES)
    }

    /// Average read plus write throughput, bytes/sec.
    pub fn disk_bytes_per_sec(&self) -> Option<f64> {
        match (self.value(DISK_READ_BYTES), self.value(DISK_WRITE_BYTES)) {
            (None, None) => None,
            (r, w) => Some(r.unwrap_or(0.0) + w.unwrap_or(0.0)),
        }
    }

    /// Bytes in plus bytes out over the window.
    pub fn network_bytes(&self) -> Option<f64> {
        match (self.value(NETWORK_IN_TOTAL), self.value(NETWORK_OUT_TOTAL)) {
            (None, None) => None,
            (i, o) => Some(i.unwrap_or(0.0) + o.unwrap_or(0.0)),
        }
    }
}

/// `start/end` ISO-8601 interval covering the last `window_days`.
pub fn timespan(window_days: i64) -> String {
    let end = Utc::now();
    let start = end - Duration::days(window_days);
    format!(
        "{}/{}",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Fetch the data points of one metric; empty when Azure Monitor has none.
pub async fn fetch_metric(
    client: &ArmClient,
    vm_id: &str,
    metric: &str,
    aggregation: Aggregation,
    timespan: &str,
) -> Result<Vec<DataPoint>> {
    let url = client.resource_url(&format!("{}/providers/microsoft.insights/metrics", vm_id));
    let response: MetricsResponse = client
        .get_typed(
            &url,
            &[
                ("api-version", API_VERSION),
                ("metricnames", metric),
                ("aggregation", aggregation.as_str()),
                ("timespan", timespan),
            ],
        )
        .await?
        .ok_or_else(|| AzcostError::not_found("virtual machine", vm_id))?;

    Ok(response
        .value
        .into_iter()
        .next()
        .and_then(|m| m.timeseries.into_iter().next())
        .map(|ts| ts.data)
        .unwrap_or_default())
}

/// Collect every metric in `VM_METRICS` for a VM. Any failed request aborts.
pub async fn fetch_vm_consumption(
    client: &ArmClient,
    resource_group: &str,
    vm_name: &str,
    window_days: i64,
) -> Result<ConsumptionData> {
    require("resource_group", resource_group)?;
    require("vm_name", vm_name)?;
    let vm_id = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
        client.subscription_id(),
        resource_group,
        vm_name
    );
    let span = timespan(window_days);

    let mut data = ConsumptionData::default();
    for (metric, aggregation) in VM_METRICS {
        let points = fetch_metric(client, &vm_id, metric, aggregation, &span).await?;
        match summarize(&points, aggregation) {
            Some(summary) => data.insert(metric, summary),
            None => debug!("No data for metric {} on {}", metric, vm_name),
        }
    }
    info!(
        "Collected {}/{} metrics for VM {} over {} day(s)",
        data.metrics.len(),
        VM_METRICS.len(),
        vm_name,
        window_days
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avg(v: Option<f64>) -> DataPoint {
        DataPoint {
            average: v,
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[], Aggregation::Average).is_none());
        assert!(summarize(&[avg(None)], Aggregation::Average).is_none());
    }

    #[test]
    fn test_summarize_counts_missing_points_in_mean() {
        let s = summarize(
            &[avg(Some(10.0)), avg(None), avg(Some(20.0)), avg(None)],
            Aggregation::Average,
        )
        .unwrap();
        assert_eq!(s.value, 7.5);
        assert_eq!(s.peak, 20.0);
        assert_eq!(s.bottom, 10.0);
        assert_eq!(s.samples, 2);
    }

    #[test]
    fn test_disk_and_network_combine() {
        let mut data = ConsumptionData::default();
        assert_eq!(data.disk_bytes_per_sec(), None);
        let s = |value| MetricSummary {
            aggregation: Aggregation::Total,
            value,
            peak: value,
            bottom: value,
            samples: 1,
        };
        data.insert(NETWORK_IN_TOTAL, s(100.0));
        data.insert(NETWORK_OUT_TOTAL, s(50.0));
        data.insert(DISK_READ_BYTES, s(4.0));
        assert_eq!(data.network_bytes(), Some(150.0));
        assert_eq!(data.disk_bytes_per_sec(), Some(4.0));
    }

    #[test]
    fn test_timespan_shape() {
        let span = timespan(7);
        let (start, end) = span.split_once('/').unwrap();
        assert!(start.ends_with('Z') && end.ends_with('Z'));
        assert!(start < end);
    }
}
