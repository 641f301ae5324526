//! Ingestion Pipeline: raw feature batch → derived code → normalized
//! geometry → upsert.
//!
//! Features are written one after another. A feature that cannot be read,
//! derived or normalized is skipped and recorded in the report; the rest of
//! the batch still runs. Losing the store aborts the batch, since every
//! remaining write would fail the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use wilayah_code::{derive, Level};
use wilayah_ingest_geojson::{normalize, RawFeature, SourceBatch, SIMPLIFY_TOLERANCE};
use wilayah_storage::{RegionStore, RegionWrite, StoreError};

/// Pipeline step at which a feature was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Properties,
    Derive,
    Geometry,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Properties => "properties",
            FailureStage::Derive => "derive",
            FailureStage::Geometry => "geometry",
            FailureStage::Store => "store",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFailure {
    /// Position of the feature in its source.
    pub index: usize,
    /// Derived code, when derivation got that far.
    pub code: Option<String>,
    pub stage: FailureStage,
    pub reason: String,
}

/// Outcome of ingesting one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub level: Level,
    /// Features upserted.
    pub written: usize,
    pub failures: Vec<FeatureFailure>,
}

impl IngestReport {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            written: 0,
            failures: Vec::new(),
        }
    }

    /// Count of features successfully written.
    pub fn processed(&self) -> usize {
        self.written
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, index: usize, code: Option<String>, stage: FailureStage, reason: String) {
        tracing::warn!(
            level = self.level.as_u8(),
            index,
            code = code.as_deref().unwrap_or("-"),
            %stage,
            reason = %reason,
            "skipping feature"
        );
        self.failures.push(FeatureFailure {
            index,
            code,
            stage,
            reason,
        });
    }
}

/// Ingest every feature of `batch` into `store`.
///
/// Geometry is always simplified at [`SIMPLIFY_TOLERANCE`], so every writer
/// stores the same shape for the same source feature.
///
/// Returns `Err` only when the store becomes unavailable; every other
/// per-feature problem is counted in the report.
pub async fn ingest(
    store: &dyn RegionStore,
    batch: &SourceBatch,
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport::new(batch.level);

    for rejected in &batch.rejected {
        report.fail(
            rejected.index,
            None,
            FailureStage::Properties,
            rejected.reason.clone(),
        );
    }

    for feature in &batch.features {
        match prepare(feature) {
            Ok(write) => match store.upsert(&write).await {
                Ok(()) => report.written += 1,
                Err(err) if err.is_unavailable() => {
                    tracing::error!(
                        level = batch.level.as_u8(),
                        written = report.written,
                        error = %err,
                        "store unavailable, aborting batch"
                    );
                    return Err(err);
                }
                Err(err) => report.fail(
                    feature.index,
                    Some(write.code.to_string()),
                    FailureStage::Store,
                    err.to_string(),
                ),
            },
            Err((code, stage, reason)) => report.fail(feature.index, code, stage, reason),
        }
    }

    tracing::info!(
        level = batch.level.as_u8(),
        total = batch.len(),
        written = report.written,
        failed = report.failed(),
        "batch ingested"
    );
    Ok(report)
}

type Rejection = (Option<String>, FailureStage, String);

fn prepare(feature: &RawFeature) -> Result<RegionWrite, Rejection> {
    let derived = derive(&feature.properties)
        .map_err(|e| (None, FailureStage::Derive, e.to_string()))?;
    let geometry = normalize(feature.geometry.as_ref(), SIMPLIFY_TOLERANCE).map_err(|e| {
        (
            Some(derived.code.to_string()),
            FailureStage::Geometry,
            e.to_string(),
        )
    })?;
    Ok(RegionWrite {
        code: derived.code,
        name: derived.name,
        level: derived.level,
        geometry,
    })
}
