//! SQLite store for VM utilization snapshots and the SKU catalogue
//!
//! One flat `metrics` table, one row per collection run, plus a `vm_skus`
//! table keyed by SKU name. Tables are created when missing; there are no
//! migrations.

use crate::azure::metrics::{
    ConsumptionData, AVAILABLE_MEMORY_BYTES, DISK_READ_BYTES, DISK_WRITE_BYTES, NETWORK_IN_TOTAL,
    NETWORK_OUT_TOTAL, PERCENTAGE_CPU,
};
use crate::azure::skus::VmSku;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::debug;

pub const VM_RESOURCE_TYPE: &str = "Microsoft.Compute/virtualMachines";

/// One row of the `metrics` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub resource_name: String,
    pub resource_type: String,
    pub current_sku: Option<String>,
    pub cpu_avg: Option<f64>,
    pub cpu_peak: Option<f64>,
    pub cpu_bottom: Option<f64>,
    pub memory_avg_bytes: Option<f64>,
    pub memory_bottom_bytes: Option<f64>,
    pub disk_read_avg: Option<f64>,
    pub disk_write_avg: Option<f64>,
    pub network_in_total: Option<f64>,
    pub network_out_total: Option<f64>,
    pub suggested_sku: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl MetricsRecord {
    /// Flatten a VM's consumption data into a row.
    pub fn for_vm(
        vm_name: &str,
        current_sku: Option<&str>,
        data: &ConsumptionData,
        suggested_sku: Option<&str>,
    ) -> Self {
        let cpu = data.get(PERCENTAGE_CPU);
        let memory = data.get(AVAILABLE_MEMORY_BYTES);
        Self {
            resource_name: vm_name.to_string(),
            resource_type: VM_RESOURCE_TYPE.to_string(),
            current_sku: current_sku.map(str::to_string),
            cpu_avg: cpu.map(|s| s.value),
            cpu_peak: cpu.map(|s| s.peak),
            cpu_bottom: cpu.map(|s| s.bottom),
            memory_avg_bytes: memory.map(|s| s.value),
            // least free memory is the busiest moment
            memory_bottom_bytes: memory.map(|s| s.bottom),
            disk_read_avg: data.value(DISK_READ_BYTES),
            disk_write_avg: data.value(DISK_WRITE_BYTES),
            network_in_total: data.value(NETWORK_IN_TOTAL),
            network_out_total: data.value(NETWORK_OUT_TOTAL),
            suggested_sku: suggested_sku.map(str::to_string),
            recorded_at: Utc::now(),
        }
    }

    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            resource_name: row.try_get("resource_name")?,
            resource_type: row.try_get("resource_type")?,
            current_sku: row.try_get("current_sku")?,
            cpu_avg: row.try_get("cpu_avg")?,
            cpu_peak: row.try_get("cpu_peak")?,
            cpu_bottom: row.try_get("cpu_bottom")?,
            memory_avg_bytes: row.try_get("memory_avg_bytes")?,
            memory_bottom_bytes: row.try_get("memory_bottom_bytes")?,
            disk_read_avg: row.try_get("disk_read_avg")?,
            disk_write_avg: row.try_get("disk_write_avg")?,
            network_in_total: row.try_get("network_in_total")?,
            network_out_total: row.try_get("network_out_total")?,
            suggested_sku: row.try_get("suggested_sku")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MetricsStore {
    pool: SqlitePool,
}

impl MetricsStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!("Opened metrics store at {}", path.display());
        Self::init(pool).await
    }

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_name       TEXT NOT NULL,
                resource_type       TEXT NOT NULL,
                current_sku         TEXT NULL,
                cpu_avg             REAL NULL,
                cpu_peak            REAL NULL,
                cpu_bottom          REAL NULL,
                memory_avg_bytes    REAL NULL,
                memory_bottom_bytes REAL NULL,
                disk_read_avg       REAL NULL,
                disk_write_avg      REAL NULL,
                network_in_total    REAL NULL,
                network_out_total   REAL NULL,
                suggested_sku       TEXT NULL,
                recorded_at         TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vm_skus (
                name       TEXT PRIMARY KEY,
                family     TEXT NULL,
                vcpus      INTEGER NULL,
                memory_gb  REAL NULL,
                data       TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn insert(&self, record: &MetricsRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO metrics (
                resource_name, resource_type, current_sku,
                cpu_avg, cpu_peak, cpu_bottom,
                memory_avg_bytes, memory_bottom_bytes,
                disk_read_avg, disk_write_avg,
                network_in_total, network_out_total,
                suggested_sku, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&record.resource_name)
        .bind(&record.resource_type)
        .bind(&record.current_sku)
        .bind(record.cpu_avg)
        .bind(record.cpu_peak)
        .bind(record.cpu_bottom)
        .bind(record.memory_avg_bytes)
        .bind(record.memory_bottom_bytes)
        .bind(record.disk_read_avg)
        .bind(record.disk_write_avg)
        .bind(record.network_in_total)
        .bind(record.network_out_total)
        .bind(&record.suggested_sku)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent snapshot for a resource.
    pub async fn latest_for(&self, resource_name: &str) -> Result<Option<MetricsRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM metrics
            WHERE resource_name = ?1
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(resource_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(MetricsRecord::from_row).transpose()?)
    }

    /// All snapshots, oldest first.
    pub async fn list(&self) -> Result<Vec<MetricsRecord>> {
        let rows = sqlx::query("SELECT * FROM metrics ORDER BY recorded_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(MetricsRecord::from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub async fn upsert_sku(&self, sku: &VmSku) -> Result<()> {
        let data = serde_json::to_string(sku)?;
        sqlx::query(
            r#"
            INSERT INTO vm_skus (name, family, vcpus, memory_gb, data, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(name) DO UPDATE SET
                family = excluded.family,
                vcpus = excluded.vcpus,
                memory_gb = excluded.memory_gb,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&sku.name)
        .bind(&sku.family)
        .bind(sku.vcpus().map(i64::from))
        .bind(sku.memory_gb())
        .bind(data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_skus(&self) -> Result<Vec<VmSku>> {
        let rows = sqlx::query("SELECT data FROM vm_skus ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut skus = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data")?;
            skus.push(serde_json::from_str(&data)?);
        }
        Ok(skus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::metrics::{Aggregation, MetricSummary};

    fn sample_data() -> ConsumptionData {
        let mut data = ConsumptionData::default();
        data.insert(
            PERCENTAGE_CPU,
            MetricSummary {
                aggregation: Aggregation::Average,
                value: 12.5,
                peak: 40.0,
                bottom: 2.0,
                samples: 4,
            },
        );
        data
    }

    #[tokio::test]
    async fn test_insert_and_latest() {
        let store = MetricsStore::open_in_memory().await.unwrap();
        assert!(store.latest_for("vm1").await.unwrap().is_none());

        let record = MetricsRecord::for_vm("vm1", Some("Standard_D4s_v3"), &sample_data(), None);
        store.insert(&record).await.unwrap();
        let mut newer = record.clone();
        newer.suggested_sku = Some("Standard_D2s_v3".to_string());
        newer.recorded_at = record.recorded_at + chrono::Duration::seconds(5);
        store.insert(&newer).await.unwrap();

        let latest = store.latest_for("vm1").await.unwrap().unwrap();
        assert_eq!(latest.suggested_sku.as_deref(), Some("Standard_D2s_v3"));
        assert_eq!(latest.cpu_avg, Some(12.5));
        assert_eq!(latest.cpu_peak, Some(40.0));
        assert_eq!(latest.memory_avg_bytes, None);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
