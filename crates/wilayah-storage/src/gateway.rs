//! Remote procedure gateway backend.
//!
//! Talks to a PostgREST-style HTTP gateway exposing the functions in
//! `sql/gateway_functions.sql` under `{base_url}/rest/v1/rpc/<name>`.

use crate::{
    geometry, LevelCounts, Region, RegionStore, RegionSummary, RegionWrite, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use wilayah_code::{Level, RegionCode};

/// Rows requested per page for set-returning functions.
const PAGE_SIZE: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RegionRow {
    kode: String,
    nama: String,
    level: i16,
    #[serde(default)]
    geom: Option<Value>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    kode: String,
    nama: String,
    level: i16,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    level: i16,
    total: i64,
}

#[derive(Clone)]
pub struct GatewayStore {
    client: Client,
    base_url: String,
    api_key: String,
    schema: Option<String>,
}

impl GatewayStore {
    pub fn new(base_url: &str, api_key: &str, schema: Option<String>) -> Result<Self, StoreError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StoreError::Rejected("gateway base URL is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Rejected(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            schema,
        })
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn send(
        &self,
        function: &str,
        body: &Value,
        range: Option<(usize, usize)>,
    ) -> Result<reqwest::Response, StoreError> {
        let mut request = self
            .client
            .post(self.rpc_url(function))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);
        if let Some(schema) = &self.schema {
            request = request
                .header("Content-Profile", schema)
                .header("Accept-Profile", schema);
        }
        if let Some((from, to)) = range {
            request = request
                .header("Range-Unit", "items")
                .header("Range", format!("{from}-{to}"))
                .header("Prefer", "count=exact");
        }

        tracing::debug!(function, ?range, "gateway call");
        request.send().await.map_err(map_transport_err)
    }

    async fn call(
        &self,
        function: &str,
        body: &Value,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self.send(function, body, None).await?;
        ensure_success(function, response).await
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        function: &str,
        body: &Value,
    ) -> Result<T, StoreError> {
        self.call(function, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(format!("{function}: {e}")))
    }

    /// Fetch every row of a set-returning function, one page at a time.
    ///
    /// The gateway may return fewer rows than asked for (its own `max-rows`
    /// setting), so a short page does not end the read. Paging stops once the
    /// `Content-Range` total is reached, or on an empty or out-of-range page
    /// when the gateway does not report a total.
    async fn call_paged<T: DeserializeOwned>(
        &self,
        function: &str,
        body: &Value,
    ) -> Result<Vec<T>, StoreError> {
        let mut rows = Vec::new();
        loop {
            let from = rows.len();
            let response = self
                .send(function, body, Some((from, from + PAGE_SIZE - 1)))
                .await?;
            if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
                return Ok(rows);
            }
            let response = ensure_success(function, response).await?;
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total);
            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| StoreError::Decode(format!("{function}: {e}")))?;
            if page.is_empty() {
                return Ok(rows);
            }
            rows.extend(page);
            if total.is_some_and(|total| rows.len() >= total) {
                return Ok(rows);
            }
        }
    }
}

async fn ensure_success(
    function: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(status_error(function, status, &text))
}

/// Total row count from a `Content-Range` value such as `0-999/5120`.
/// `None` when the gateway reports `*`.
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn region_from_row(row: RegionRow) -> Result<Region, StoreError> {
    let code = RegionCode::parse(&row.kode)
        .map_err(|e| StoreError::Decode(format!("stored code `{}`: {e}", row.kode)))?;
    Ok(Region {
        geometry: geometry::decode(code.as_str(), row.geom),
        level: level_from_row(row.level)?,
        code,
        name: row.nama,
        updated_at: row.updated_at,
    })
}

fn level_from_row(level: i16) -> Result<Level, StoreError> {
    u8::try_from(level)
        .ok()
        .and_then(Level::from_u8)
        .ok_or_else(|| StoreError::Decode(format!("stored level {level} is out of range")))
}

fn map_transport_err(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Rejected(err.to_string())
    }
}

/// Gateway and upstream outages are `Unavailable`; any other refusal is
/// `Rejected`.
fn status_error(function: &str, status: StatusCode, body: &str) -> StoreError {
    let message = format!("{function}: {status} {}", body.trim());
    match status {
        StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => StoreError::Unavailable(message),
        _ => StoreError::Rejected(message),
    }
}

#[async_trait]
impl RegionStore for GatewayStore {
    fn backend(&self) -> &'static str {
        "gateway"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.call_json::<bool>("wilayah_exists_level", &json!({ "p_level": 1 }))
            .await
            .map(|_| ())
    }

    async fn exact_by_level(
        &self,
        level: Level,
        code: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows: Vec<RegionRow> = self
            .call_json(
                "wilayah_exact",
                &json!({ "p_level": level.as_u8(), "p_kode": code.as_str() }),
            )
            .await?;
        rows.into_iter().map(region_from_row).collect()
    }

    async fn prefix_by_level(
        &self,
        level: Level,
        prefix: &RegionCode,
    ) -> Result<Vec<Region>, StoreError> {
        let rows: Vec<RegionRow> = self
            .call_paged(
                "wilayah_prefix",
                &json!({ "p_level": level.as_u8(), "p_prefix": prefix.as_str() }),
            )
            .await?;
        rows.into_iter().map(region_from_row).collect()
    }

    async fn upsert(&self, region: &RegionWrite) -> Result<(), StoreError> {
        let body = json!({
            "p_kode": region.code.as_str(),
            "p_nama": region.name,
            "p_level": region.level.as_u8(),
            "p_geom": geometry::encode(&region.geometry),
        });
        self.call("wilayah_upsert", &body).await?;
        Ok(())
    }

    async fn count_by_prefix(&self, prefix: &RegionCode) -> Result<LevelCounts, StoreError> {
        let rows: Vec<CountRow> = self
            .call_json("wilayah_count_prefix", &json!({ "p_prefix": prefix.as_str() }))
            .await?;
        let mut counts = LevelCounts::default();
        for row in rows {
            counts.add(level_from_row(row.level)?, u64::try_from(row.total).unwrap_or(0));
        }
        Ok(counts)
    }

    async fn exists_any_at_level(&self, level: Level) -> Result<bool, StoreError> {
        self.call_json("wilayah_exists_level", &json!({ "p_level": level.as_u8() }))
            .await
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<RegionSummary>, StoreError> {
        let rows: Vec<SummaryRow> = self
            .call_json(
                "wilayah_search",
                &json!({ "p_query": text, "p_limit": limit }),
            )
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(RegionSummary {
                    code: RegionCode::parse(&row.kode)
                        .map_err(|e| StoreError::Decode(format!("stored code `{}`: {e}", row.kode)))?,
                    name: row.nama,
                    level: level_from_row(row.level)?,
                })
            })
            .collect()
    }
}
