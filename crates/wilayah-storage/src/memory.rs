//! In-process store.
//!
//! Rows keep their geometry as serialized GeoJSON text, the way a database
//! column would, so reads go through the same decode path as the real
//! backends.

use crate::{
    geometry, LevelCounts, Region, RegionStore, RegionSummary, RegionWrite, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use wilayah_code::{Level, RegionCode};

#[derive(Debug, Clone)]
struct Row {
    code: RegionCode,
    name: String,
    level: Level,
    geometry: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Rows keyed by code text, so a code's descendants form one contiguous
/// key range starting at `code.`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Store a row verbatim, bypassing write-side normalization.
    ///
    /// Used to load fixtures, including rows whose geometry text a real
    /// database could hold but that does not parse.
    pub fn put_raw(&self, code: RegionCode, name: &str, level: Level, geometry: Option<String>) {
        let now = Utc::now();
        self.rows.write().insert(
            code.as_str().to_string(),
            Row {
                code,
                name: name.to_string(),
                level,
                geometry,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Creation time of a stored row.
    pub fn created_at(&self, code: &RegionCode) -> Option<DateTime<Utc>> {
        self.rows.read().get(code.as_str()).map(|row| row.created_at)
    }

    fn to_region(row: &Row) -> Region {
        Region {
            code: row.code.clone(),
            name: row.name.clone(),
            level: row.level,
            geometry: geometry::decode_text(row.code.as_str(), row.geometry.clone()),
            updated_at: Some(row.updated_at),
        }
    }

    /// Rows strictly below `prefix` in the hierarchy, in code order.
    fn descendants<'a>(
        rows: &'a BTreeMap<String, Row>,
        prefix: &RegionCode,
    ) -> impl Iterator<Item = &'a Row> + 'a {
        let start = prefix.descendant_prefix();
        rows.range(start.clone()..)
            .take_while(move |(code, _)| code.starts_with(&start))
            .map(|(_, row)| row)
    }
}

#[async_trait]
impl RegionStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn exact_by_level(
        &self,
        level: Level,
        code: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows = self.rows.read();
        Ok(rows
            .get(code.as_str())
            .filter(|row| row.level == level)
            .map(Self::to_region)
            .into_iter()
            .collect())
    }

    async fn prefix_by_level(
        &self,
        level: Level,
        prefix: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows = self.rows.read();
        Ok(Self::descendants(&rows, prefix)
            .filter(|row| row.level == level)
            .map(Self::to_region)
            .collect())
    }

    async fn upsert(&self, region: &RegionWrite) -> Result<(), StoreError> {
        let text = serde_json::to_string(&geometry::encode(&region.geometry))
            .map_err(|e| StoreError::Rejected(format!("geometry does not serialize: {e}")))?;
        let now = Utc::now();

        let mut rows = self.rows.write();
        rows.entry(region.code.as_str().to_string())
            .and_modify(|row| {
                row.name = region.name.clone();
                row.geometry = Some(text.clone());
                row.updated_at = now;
            })
            .or_insert_with(|| Row {
                code: region.code.clone(),
                name: region.name.clone(),
                level: region.level,
                geometry: Some(text.clone()),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn count_by_prefix(&self, prefix: &RegionCode) -> Result<LevelCounts, StoreError> {
        let rows = self.rows.read();
        let mut counts = LevelCounts::default();
        if let Some(row) = rows.get(prefix.as_str()) {
            counts.add(row.level, 1);
        }
        for row in Self::descendants(&rows, prefix) {
            counts.add(row.level, 1);
        }
        Ok(counts)
    }

    async fn exists_any_at_level(&self, level: Level) -> Result<bool, StoreError> {
        Ok(self.rows.read().values().any(|row| row.level == level))
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<RegionSummary>, StoreError> {
        let needle = text.to_lowercase();
        let rows = self.rows.read();
        let mut hits: Vec<RegionSummary> = rows
            .values()
            .filter(|row| row.name.to_lowercase().contains(&needle))
            .map(|row| RegionSummary {
                code: row.code.clone(),
                name: row.name.clone(),
                level: row.level,
            })
            .collect();
        hits.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
        hits.truncate(limit);
        Ok(hits)
    }
}
