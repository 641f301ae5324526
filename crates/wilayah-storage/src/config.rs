//! Backend selection.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DATABASE_URL_ENV: &str = "WILAYAH_DATABASE_URL";
pub const GATEWAY_URL_ENV: &str = "WILAYAH_GATEWAY_URL";
pub const GATEWAY_KEY_ENV: &str = "WILAYAH_GATEWAY_KEY";

fn default_max_connections() -> u32 {
    10
}

/// Which store backs the process. Chosen once at startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process store; contents are lost on exit.
    Memory,
    /// Direct PostGIS connection pool.
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Apply `sql/schema.sql` on connect.
        #[serde(default)]
        migrate: bool,
    },
    /// PostgREST-style remote procedure gateway over the same tables.
    Gateway {
        base_url: String,
        api_key: String,
        /// Postgres schema exposed by the gateway (`Content-Profile`).
        #[serde(default)]
        schema: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

impl StoreConfig {
    /// Backend from the environment, if one is configured there.
    ///
    /// A database URL wins over a gateway URL.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = get(DATABASE_URL_ENV) {
            return Some(StoreConfig::Postgres {
                url,
                max_connections: default_max_connections(),
                migrate: false,
            });
        }
        let base_url = get(GATEWAY_URL_ENV)?;
        Some(StoreConfig::Gateway {
            base_url,
            api_key: get(GATEWAY_KEY_ENV).unwrap_or_default(),
            schema: None,
        })
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::Postgres {
                max_connections,
                migrate,
                ..
            } => f
                .debug_struct("Postgres")
                .field("url", &"<redacted>")
                .field("max_connections", max_connections)
                .field("migrate", migrate)
                .finish(),
            StoreConfig::Gateway {
                base_url, schema, ..
            } => f
                .debug_struct("Gateway")
                .field("base_url", base_url)
                .field("api_key", &"<redacted>")
                .field("schema", schema)
                .finish(),
        }
    }
}
