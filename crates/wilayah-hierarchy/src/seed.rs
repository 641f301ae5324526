//! One-time bootstrap seeding.
//!
//! When no province is stored, the designated top-level source file is
//! ingested at level 1. Two guards keep this from repeating:
//!
//! - a per-process flag, so a process tries at most once;
//! - a marker file written before the first write. While the marker exists,
//!   no process seeds again, even if the earlier attempt failed halfway.
//!   An operator removes the marker to allow a retry.

use crate::pipeline::{ingest, IngestReport};
use crate::status::has_bootstrap_data;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use wilayah_code::Level;
use wilayah_ingest_geojson::{parse_source, GeoJsonError};
use wilayah_storage::{RegionStore, StoreError};

pub const SEED_SOURCE_ENV: &str = "WILAYAH_SEED_SOURCE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub enabled: bool,
    /// Top-level (province) boundary file.
    pub source: Option<PathBuf>,
    pub marker_path: PathBuf,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: None,
            marker_path: PathBuf::from("./.wilayah-seed.json"),
        }
    }
}

impl SeedConfig {
    /// Take the seed source from the environment when it is set there.
    pub fn with_env(mut self) -> Self {
        if let Some(source) = std::env::var_os(SEED_SOURCE_ENV).filter(|s| !s.is_empty()) {
            self.source = Some(PathBuf::from(source));
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot read seed source {}: {source}", path.display())]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("seed source {} is not usable GeoJSON: {source}", path.display())]
    Source { path: PathBuf, source: GeoJsonError },
    #[error("cannot write seed marker {}: {source}", path.display())]
    Marker {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Recorded state of the last seed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerState {
    /// Written before ingestion starts; left behind if the process dies.
    Started,
    Completed,
    /// Finished, but some features were skipped.
    Partial,
    Failed,
}

/// Contents of the seed marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMarker {
    pub attempted_at: DateTime<Utc>,
    pub outcome: MarkerState,
    pub written: usize,
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SeedMarker {
    pub fn read(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

/// What a call to [`Seeder::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Disabled,
    /// This process already tried.
    AlreadyAttempted,
    /// A province is already stored.
    DataPresent,
    /// An earlier attempt left a marker; `marker` is `None` when it could
    /// not be read.
    Blocked {
        path: PathBuf,
        marker: Option<SeedMarker>,
    },
    NoSource,
    Seeded(IngestReport),
}

pub struct Seeder {
    config: SeedConfig,
    attempted: AtomicBool,
}

impl Seeder {
    pub fn new(config: SeedConfig) -> Self {
        Self {
            config,
            attempted: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Seed `store` if it has no top-level data and nothing forbids it.
    pub async fn run(
        &self,
        store: &dyn RegionStore,
    ) -> Result<SeedOutcome, SeedError> {
        if !self.config.enabled {
            tracing::info!("bootstrap seeding disabled");
            return Ok(SeedOutcome::Disabled);
        }
        if self.attempted.swap(true, Ordering::SeqCst) {
            return Ok(SeedOutcome::AlreadyAttempted);
        }
        if has_bootstrap_data(store).await? {
            tracing::info!("top-level regions present, skipping bootstrap seed");
            return Ok(SeedOutcome::DataPresent);
        }
        let Some(source) = self.config.source.clone() else {
            tracing::warn!("no top-level regions stored and no seed source configured");
            return Ok(SeedOutcome::NoSource);
        };

        let path = self.config.marker_path.clone();
        let mut marker = SeedMarker {
            attempted_at: Utc::now(),
            outcome: MarkerState::Started,
            written: 0,
            source: source.clone(),
            error: None,
        };
        if !create_marker(&path, &marker)? {
            let previous = SeedMarker::read(&path);
            tracing::warn!(
                marker = %path.display(),
                previous = ?previous.as_ref().map(|m| m.outcome),
                "seed marker present, remove it to allow another attempt"
            );
            return Ok(SeedOutcome::Blocked {
                path,
                marker: previous,
            });
        }

        tracing::info!(source = %source.display(), "seeding top-level regions");
        let result = self.seed_from(&source, store).await;

        match &result {
            Ok(report) => {
                marker.written = report.written;
                marker.outcome = if report.is_clean() {
                    MarkerState::Completed
                } else {
                    MarkerState::Partial
                };
                tracing::info!(
                    written = report.written,
                    failed = report.failed(),
                    "bootstrap seed finished"
                );
            }
            Err(err) => {
                marker.outcome = MarkerState::Failed;
                marker.error = Some(err.to_string());
                tracing::error!(error = %err, "bootstrap seed failed");
            }
        }
        write_marker(&path, &marker)?;

        result.map(SeedOutcome::Seeded)
    }

    async fn seed_from(
        &self,
        source: &Path,
        store: &dyn RegionStore,
    ) -> Result<IngestReport, SeedError> {
        let text = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| SeedError::ReadSource {
                path: source.to_path_buf(),
                source: e,
            })?;
        let batch = parse_source(&text, Level::Province).map_err(|e| SeedError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;
        Ok(ingest(store, &batch).await?)
    }
}

/// Create the marker only if none exists. Returns `false` when one does.
fn create_marker(path: &Path, marker: &SeedMarker) -> Result<bool, SeedError> {
    let err = |source| SeedError::Marker {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(err)?;
    }
    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(err(e)),
    };
    file.write_all(&marker_json(marker)).map_err(err)?;
    Ok(true)
}

fn write_marker(path: &Path, marker: &SeedMarker) -> Result<(), SeedError> {
    std::fs::write(path, marker_json(marker)).map_err(|source| SeedError::Marker {
        path: path.to_path_buf(),
        source,
    })
}

fn marker_json(marker: &SeedMarker) -> Vec<u8> {
    serde_json::to_vec_pretty(marker).unwrap_or_default()
}
