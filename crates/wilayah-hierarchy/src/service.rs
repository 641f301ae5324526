//! The four external operations over one shared store handle.

use crate::compose::{compose, HierarchyBundle};
use crate::pipeline::{ingest, IngestReport};
use crate::seed::{SeedError, SeedOutcome, Seeder};
use crate::status::{has_bootstrap_data, status, StatusReport};
use crate::HierarchyError;
use std::sync::Arc;
use wilayah_code::{Level, RegionCode};
use wilayah_ingest_geojson::{parse_source, SourceBatch};
use wilayah_storage::{RegionStore, RegionSummary};

/// Maximum hits returned by [`RegionService::search`].
pub const SEARCH_LIMIT: usize = 10;

#[derive(Clone)]
pub struct RegionService {
    store: Arc<dyn RegionStore>,
}

impl RegionService {
    pub fn new(store: Arc<dyn RegionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RegionStore> {
        &self.store
    }

    /// Ingest a GeoJSON source whose level is declared by `source_tag`.
    pub async fn ingest(&self, source_tag: &str, text: &str) -> Result<IngestReport, HierarchyError> {
        let level = Level::from_source_tag(source_tag)
            .ok_or_else(|| HierarchyError::UnknownSource(source_tag.to_string()))?;
        let batch = parse_source(text, level)?;
        self.ingest_batch(&batch).await
    }

    pub async fn ingest_batch(&self, batch: &SourceBatch) -> Result<IngestReport, HierarchyError> {
        Ok(ingest(self.store.as_ref(), batch).await?)
    }

    pub async fn status(&self, prefix: &str) -> Result<StatusReport, HierarchyError> {
        let prefix = RegionCode::parse(prefix)?;
        Ok(status(self.store.as_ref(), &prefix).await?)
    }

    pub async fn query_hierarchy(&self, code: &str) -> Result<HierarchyBundle, HierarchyError> {
        let code = RegionCode::parse(code)?;
        Ok(compose(self.store.as_ref(), &code).await?)
    }

    /// Regions whose name contains `text`, case-insensitively, ordered by
    /// level then name. Blank text matches nothing.
    pub async fn search(&self, text: &str) -> Result<Vec<RegionSummary>, HierarchyError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search(text, SEARCH_LIMIT).await?)
    }

    pub async fn has_bootstrap_data(&self) -> Result<bool, HierarchyError> {
        Ok(has_bootstrap_data(self.store.as_ref()).await?)
    }

    pub async fn seed(&self, seeder: &Seeder) -> Result<SeedOutcome, SeedError> {
        seeder.run(self.store.as_ref()).await
    }
}
