//! Wilayah hierarchy engine
//!
//! Ingestion, hierarchy query composition and bootstrap seeding on top of a
//! [`RegionStore`](wilayah_storage::RegionStore):
//!
//! ```text
//!  source file ──► parse ──► derive ──► normalize ──► upsert ──┐
//!  (GeoJSON)      (level)    (code)     (geometry)             ▼
//!                                                       ┌────────────┐
//!  query code ──► plan ──► concurrent fetches ◄─────────│   store    │
//!                              │                        └────────────┘
//!                              ▼
//!                  bundle { top, second, third, fourth }
//! ```
//!
//! [`RegionService`] bundles the external operations (`ingest`, `status`,
//! `query_hierarchy`, `search`) over one shared store handle.

pub mod compose;
pub mod pipeline;
pub mod seed;
pub mod service;
pub mod status;

pub use compose::{compose, plan, Fetch, FetchRole, HierarchyBundle};
pub use pipeline::{ingest, FailureStage, FeatureFailure, IngestReport};
pub use seed::{MarkerState, SeedConfig, SeedError, SeedMarker, SeedOutcome, Seeder};
pub use service::{RegionService, SEARCH_LIMIT};
pub use status::{has_bootstrap_data, status, StatusReport};

use wilayah_code::CodeError;
use wilayah_ingest_geojson::GeoJsonError;
use wilayah_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("unknown source tag `{0}`")]
    UnknownSource(String),
    #[error("invalid region code: {0}")]
    Code(#[from] CodeError),
    #[error(transparent)]
    Source(#[from] GeoJsonError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HierarchyError {
    /// The store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, HierarchyError::Store(err) if err.is_unavailable())
    }

    /// The caller sent something unusable.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            HierarchyError::UnknownSource(_) | HierarchyError::Code(_) | HierarchyError::Source(_)
        )
    }
}
