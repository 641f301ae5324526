//! Wilayah region store
//!
//! One contract ([`RegionStore`]) over the persistent collection of
//! `code → (name, level, simplified geometry)`:
//!
//! ```text
//! ┌──────────────────────┐
//! │  ingestion / query   │
//! └──────────┬───────────┘
//!            │ Arc<dyn RegionStore>
//!   ┌────────┼─────────────────┬──────────────────┐
//!   ▼        ▼                 ▼                  │
//! Memory   Postgres (PostGIS)  Gateway (RPC/HTTP) │
//!          direct sqlx pool    PostgREST procs ───┘ same tables
//! ```
//!
//! ## Shared semantics
//!
//! - Prefix lookups are separator-aware: the prefix `11.1` matches
//!   `11.1.05`, never `11.10`.
//! - Prefix results are ordered by code. No backend caps them; the gateway
//!   pages through results rather than accepting a server-side row cap.
//! - Search is the only capped read, and the cap is the caller's `limit`.
//! - Geometry is normalized on read. Whether a backend hands back a JSON
//!   object or a serialized string, callers get a parsed
//!   [`geojson::Geometry`], or `None` (logged) when it cannot be parsed.
//! - Upsert is a single atomic statement: insert, or overwrite name,
//!   geometry and `updated_at` while keeping `code` and `created_at`.

pub mod config;
pub mod gateway;
pub mod geometry;
pub mod memory;
pub mod postgres;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wilayah_code::{Level, RegionCode};

pub use config::StoreConfig;
pub use gateway::GatewayStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// ============================================================================
// Core Types
// ============================================================================

/// A stored region as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub code: RegionCode,
    pub name: String,
    pub level: Level,
    /// `None` when the row has no geometry or it could not be parsed.
    pub geometry: Option<geojson::Geometry>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A region ready to be written: derived identity plus normalized geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWrite {
    pub code: RegionCode,
    pub name: String,
    pub level: Level,
    pub geometry: MultiPolygon<f64>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub code: RegionCode,
    pub name: String,
    pub level: Level,
}

/// Stored region counts per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub level1: u64,
    pub level2: u64,
    pub level3: u64,
    pub level4: u64,
}

impl LevelCounts {
    pub fn get(&self, level: Level) -> u64 {
        match level {
            Level::Province => self.level1,
            Level::Regency => self.level2,
            Level::District => self.level3,
            Level::Village => self.level4,
        }
    }

    pub fn add(&mut self, level: Level, n: u64) {
        match level {
            Level::Province => self.level1 += n,
            Level::Regency => self.level2 += n,
            Level::District => self.level3 += n,
            Level::Village => self.level4 += n,
        }
    }

    pub fn total(&self) -> u64 {
        self.level1 + self.level2 + self.level3 + self.level4
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered but refused the command.
    #[error("store rejected request: {0}")]
    Rejected(String),
    /// The store answered with something we cannot read.
    #[error("unreadable store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

// ============================================================================
// Store contract
// ============================================================================

#[async_trait]
pub trait RegionStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Confirm the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Regions at `level` whose code is exactly `code` (zero or one row).
    async fn exact_by_level(&self, level: Level, code: &RegionCode)
        -> Result<Vec<Region>, StoreError>;

    /// Regions at `level` that descend from `prefix`, ordered by code.
    async fn prefix_by_level(
        &self,
        level: Level,
        prefix: &RegionCode,
    ) -> Result<Vec<Region>, StoreError>;

    /// Insert or overwrite one region atomically.
    async fn upsert(&self, region: &RegionWrite) -> Result<(), StoreError>;

    /// Counts per level of `prefix` itself and all of its descendants.
    async fn count_by_prefix(&self, prefix: &RegionCode) -> Result<LevelCounts, StoreError>;

    async fn exists_any_at_level(&self, level: Level) -> Result<bool, StoreError>;

    /// Case-insensitive substring match on names, ordered by level then
    /// name, at most `limit` hits.
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<RegionSummary>, StoreError>;
}

/// Open the backend selected by `config`.
///
/// Called once at startup; the returned handle owns the process-wide
/// connection pool and is shared by every request.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RegionStore>, StoreError> {
    let store: Arc<dyn RegionStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::Postgres {
            url,
            max_connections,
            migrate,
        } => {
            let store = PostgresStore::connect(url, *max_connections).await?;
            if *migrate {
                store.migrate().await?;
            }
            Arc::new(store)
        }
        StoreConfig::Gateway {
            base_url,
            api_key,
            schema,
        } => Arc::new(GatewayStore::new(base_url, api_key, schema.clone())?),
    };
    tracing::info!(backend = store.backend(), "region store opened");
    Ok(store)
}
