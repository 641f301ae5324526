//! Direct PostGIS backend over a shared sqlx pool.

use crate::{
    geometry, LevelCounts, Region, RegionStore, RegionSummary, RegionWrite, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use wilayah_code::{Level, RegionCode};

const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

const SELECT_REGION: &str =
    "SELECT kode, nama, level, ST_AsGeoJSON(geom) AS geom, updated_at FROM wilayah";

type RegionRow = (String, String, i16, Option<String>, DateTime<Utc>);

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await
            .map_err(map_err)?;
        Ok(Self::new(pool))
    }

    /// Create the table and indexes if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    fn region_from_row((kode, nama, level, geom, updated_at): RegionRow) -> Result<Region, StoreError> {
        let code = RegionCode::parse(&kode)
            .map_err(|e| StoreError::Decode(format!("stored code `{kode}`: {e}")))?;
        let level = level_from_column(level)?;
        Ok(Region {
            geometry: geometry::decode_text(code.as_str(), geom),
            code,
            name: nama,
            level,
            updated_at: Some(updated_at),
        })
    }
}

#[async_trait]
impl RegionStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn exact_by_level(
        &self,
        level: Level,
        code: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows: Vec<RegionRow> =
            sqlx::query_as(&format!("{SELECT_REGION} WHERE level = $1 AND kode = $2"))
                .bind(level_column(level))
                .bind(code.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)?;
        rows.into_iter().map(Self::region_from_row).collect()
    }

    async fn prefix_by_level(
        &self,
        level: Level,
        prefix: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows: Vec<RegionRow> = sqlx::query_as(&format!(
            "{SELECT_REGION} WHERE level = $1 AND starts_with(kode, $2) ORDER BY kode"
        ))
        .bind(level_column(level))
        .bind(prefix.descendant_prefix())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        rows.into_iter().map(Self::region_from_row).collect()
    }

    async fn upsert(&self, region: &RegionWrite) -> Result<(), StoreError> {
        let geom = serde_json::to_string(&geometry::encode(&region.geometry))
            .map_err(|e| StoreError::Rejected(format!("geometry does not serialize: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO wilayah (kode, nama, level, geom, updated_at)
            VALUES ($1, $2, $3, ST_SetSRID(ST_GeomFromGeoJSON($4), 4326), now())
            ON CONFLICT (kode) DO UPDATE
                SET nama = EXCLUDED.nama, geom = EXCLUDED.geom, updated_at = now()
            "#,
        )
        .bind(region.code.as_str())
        .bind(&region.name)
        .bind(level_column(region.level))
        .bind(geom)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn count_by_prefix(&self, prefix: &RegionCode) -> Result<LevelCounts, StoreError> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT level, COUNT(*) FROM wilayah WHERE kode = $1 OR starts_with(kode, $2) GROUP BY level",
        )
        .bind(prefix.as_str())
        .bind(prefix.descendant_prefix())
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let mut counts = LevelCounts::default();
        for (level, total) in rows {
            counts.add(level_from_column(level)?, u64::try_from(total).unwrap_or(0));
        }
        Ok(counts)
    }

    async fn exists_any_at_level(&self, level: Level) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM wilayah WHERE level = $1)")
                .bind(level_column(level))
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)?;
        Ok(exists)
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<RegionSummary>, StoreError> {
        let rows: Vec<(String, String, i16)> = sqlx::query_as(
            r#"
            SELECT kode, nama, level FROM wilayah
            WHERE strpos(lower(nama), lower($1)) > 0
            ORDER BY level, nama
            LIMIT $2
            "#,
        )
        .bind(text)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter()
            .map(|(kode, nama, level)| {
                Ok(RegionSummary {
                    code: RegionCode::parse(&kode)
                        .map_err(|e| StoreError::Decode(format!("stored code `{kode}`: {e}")))?,
                    name: nama,
                    level: level_from_column(level)?,
                })
            })
            .collect()
    }
}

fn level_column(level: Level) -> i16 {
    i16::from(level.as_u8())
}

fn level_from_column(level: i16) -> Result<Level, StoreError> {
    u8::try_from(level)
        .ok()
        .and_then(Level::from_u8)
        .ok_or_else(|| StoreError::Decode(format!("stored level {level} is out of range")))
}

/// Connection-level failures are `Unavailable`; everything else the
/// database said is `Rejected`.
fn map_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(err.to_string())
        }
        other => StoreError::Rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_columns_round_trip() {
        for level in Level::ALL {
            assert_eq!(level_from_column(level_column(level)).unwrap(), level);
        }
        assert!(level_from_column(0).is_err());
        assert!(level_from_column(-3).is_err());
    }

    #[test]
    fn connection_errors_are_unavailable() {
        assert!(map_err(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(map_err(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused"
        )))
        .is_unavailable());
        assert!(!map_err(sqlx::Error::RowNotFound).is_unavailable());
    }

    #[test]
    fn schema_creates_the_region_table() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS wilayah"));
        assert!(SCHEMA_SQL.contains("kode        text PRIMARY KEY"));
    }
}
