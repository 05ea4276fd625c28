//! VM metric aggregation and collection

mod common;

use azcostctl::azure::metrics::{
    fetch_vm_consumption, summarize, Aggregation, DataPoint, API_VERSION, AVAILABLE_MEMORY_BYTES,
    DISK_READ_BYTES, DISK_WRITE_BYTES, NETWORK_IN_TOTAL, NETWORK_OUT_TOTAL, PERCENTAGE_CPU,
};
use azcostctl::error::AzcostError;
use common::{api_version, client, sub_path, ARM_500};
use mockito::Matcher;
use serde_json::json;

fn points(json: serde_json::Value) -> Vec<DataPoint> {
    serde_json::from_value(json).unwrap()
}

#[test]
fn test_average_of_fixed_series() {
    // an hour without a sample counts as zero
    let data = points(json!([
        { "timeStamp": "2024-03-01T00:00:00Z", "average": 12.0 },
        { "timeStamp": "2024-03-01T01:00:00Z", "average": 18.0 },
        { "timeStamp": "2024-03-01T02:00:00Z" },
        { "timeStamp": "2024-03-01T03:00:00Z", "average": 30.0 },
        { "timeStamp": "2024-03-01T04:00:00Z", "average": 4.0 }
    ]));
    let summary = summarize(&data, Aggregation::Average).unwrap();
    assert_eq!(summary.value, 12.8);
    assert_eq!(summary.peak, 30.0);
    assert_eq!(summary.bottom, 4.0);
    assert_eq!(summary.samples, 4);
}

#[test]
fn test_total_of_fixed_series() {
    let data = points(json!([
        { "total": 1024.0 },
        { "total": 2048.0 },
        { "total": null },
        { "total": 4096.0 }
    ]));
    let summary = summarize(&data, Aggregation::Total).unwrap();
    assert_eq!(summary.value, 7168.0);
    assert_eq!(summary.samples, 3);
}

#[test]
fn test_summary_ignores_other_aggregations() {
    // totals are not averages
    let data = points(json!([{ "total": 5.0 }, { "total": 7.0 }]));
    assert!(summarize(&data, Aggregation::Average).is_none());
    assert!(summarize(&[], Aggregation::Total).is_none());
}

const VM_METRICS_PATH: &str =
    "/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm1/providers/microsoft.insights/metrics";

fn series(points: serde_json::Value) -> String {
    json!({ "value": [ { "timeseries": [ { "data": points } ] } ] }).to_string()
}

fn metric(name: &str) -> Matcher {
    Matcher::UrlEncoded("metricnames".into(), name.into())
}

#[tokio::test]
async fn test_fetch_vm_consumption() {
    let mut server = mockito::Server::new_async().await;
    let path = sub_path(VM_METRICS_PATH);

    let cpu = server
        .mock("GET", path.as_str())
        .match_query(Matcher::AllOf(vec![
            api_version(API_VERSION),
            metric(PERCENTAGE_CPU),
            Matcher::UrlEncoded("aggregation".into(), "Average".into()),
            Matcher::Regex("timespan=".into()),
        ]))
        .with_status(200)
        .with_body(series(json!([{ "average": 10.0 }, { "average": 20.0 }, { "average": 30.0 }])))
        .create_async()
        .await;
    let network_in = server
        .mock("GET", path.as_str())
        .match_query(Matcher::AllOf(vec![
            metric(NETWORK_IN_TOTAL),
            Matcher::UrlEncoded("aggregation".into(), "Total".into()),
        ]))
        .with_status(200)
        .with_body(series(json!([{ "total": 100.0 }, { "total": 300.0 }])))
        .create_async()
        .await;
    // everything else has no data at all
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::AnyOf(vec![
            metric(AVAILABLE_MEMORY_BYTES),
            metric(DISK_READ_BYTES),
            metric(DISK_WRITE_BYTES),
            metric(NETWORK_OUT_TOTAL),
        ]))
        .with_status(200)
        .with_body(r#"{"value":[{"timeseries":[]}]}"#)
        .expect(4)
        .create_async()
        .await;

    let data = fetch_vm_consumption(&client(&server), "rg-app", "vm1", 7)
        .await
        .unwrap();
    cpu.assert_async().await;
    network_in.assert_async().await;

    assert_eq!(data.metrics.len(), 2);
    assert_eq!(data.cpu_average(), Some(20.0));
    assert_eq!(data.value(NETWORK_IN_TOTAL), Some(400.0));
    assert_eq!(data.network_bytes(), Some(400.0));
    assert_eq!(data.available_memory_bytes(), None);
}

#[tokio::test]
async fn test_fetch_vm_consumption_aborts_on_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", sub_path(VM_METRICS_PATH).as_str())
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(ARM_500)
        .create_async()
        .await;

    let err = fetch_vm_consumption(&client(&server), "rg-app", "vm1", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, AzcostError::Api { .. }));
}

#[tokio::test]
async fn test_fetch_vm_consumption_malformed_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", sub_path(VM_METRICS_PATH).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let err = fetch_vm_consumption(&client(&server), "rg-app", "vm1", 7)
        .await
        .unwrap_err();
    assert!(matches!(err, AzcostError::Json(_)));
}
