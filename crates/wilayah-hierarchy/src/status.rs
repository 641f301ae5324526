//! Stored-data status per code prefix.

use serde::{Deserialize, Serialize};
use wilayah_code::{Level, RegionCode};
use wilayah_storage::{LevelCounts, RegionStore, StoreError};

/// Whether anything is stored under a prefix, and how much per level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub prefix: RegionCode,
    pub counts: LevelCounts,
    pub available: bool,
}

/// Counts of `prefix` and everything below it.
pub async fn status(store: &dyn RegionStore, prefix: &RegionCode) -> Result<StatusReport, StoreError> {
    let counts = store.count_by_prefix(prefix).await?;
    tracing::debug!(prefix = %prefix, total = counts.total(), "status");
    Ok(StatusReport {
        prefix: prefix.clone(),
        available: counts.total() > 0,
        counts,
    })
}

/// `true` once at least one top-level region is stored.
pub async fn has_bootstrap_data(store: &dyn RegionStore) -> Result<bool, StoreError> {
    store.exists_any_at_level(Level::Province).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon};
    use wilayah_storage::{MemoryStore, RegionWrite};

    async fn put(store: &MemoryStore, kode: &str, nama: &str) {
        let code = RegionCode::parse(kode).unwrap();
        store
            .upsert(&RegionWrite {
                level: code.level().unwrap(),
                code,
                name: nama.to_string(),
                geometry: MultiPolygon(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ]]),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_of_empty_prefix_is_unavailable() {
        let store = MemoryStore::new();
        let report = status(&store, &RegionCode::parse("11").unwrap()).await.unwrap();
        assert!(!report.available);
        assert_eq!(report.counts.total(), 0);
    }

    #[tokio::test]
    async fn test_status_counts_per_level() {
        let store = MemoryStore::new();
        put(&store, "11", "Aceh").await;
        put(&store, "11.01", "Simeulue").await;
        put(&store, "11.01.05", "Teupah Selatan").await;
        put(&store, "12", "Sumatera Utara").await;

        let report = status(&store, &RegionCode::parse("11").unwrap()).await.unwrap();
        assert!(report.available);
        assert_eq!(report.counts.level1, 1);
        assert_eq!(report.counts.level2, 1);
        assert_eq!(report.counts.level3, 1);
        assert_eq!(report.counts.level4, 0);
    }

    #[tokio::test]
    async fn test_bootstrap_data_needs_a_province() {
        let store = MemoryStore::new();
        assert!(!has_bootstrap_data(&store).await.unwrap());
        put(&store, "11.01", "Simeulue").await;
        assert!(!has_bootstrap_data(&store).await.unwrap());
        put(&store, "11", "Aceh").await;
        assert!(has_bootstrap_data(&store).await.unwrap());
    }
}
