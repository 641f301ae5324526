//! Process configuration: JSON file, then environment, then flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use wilayah_hierarchy::SeedConfig;
use wilayah_storage::StoreConfig;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7878))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WilayahConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    /// Address `serve` binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for WilayahConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            seed: SeedConfig::default(),
            listen: default_listen(),
        }
    }
}

/// Flag values that override the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub migrate: bool,
    pub gateway_url: Option<String>,
    pub gateway_key: Option<String>,
    pub memory: bool,
    pub seed_source: Option<PathBuf>,
    pub seed_marker: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
}

impl WilayahConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Build the effective configuration.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(store) = StoreConfig::from_env() {
            config.store = store;
        }
        config.seed = config.seed.with_env();
        config.apply(overrides);
        Ok(config)
    }

    fn apply(&mut self, o: &Overrides) {
        if o.memory {
            self.store = StoreConfig::Memory;
        } else if let Some(url) = &o.database_url {
            self.store = StoreConfig::Postgres {
                url: url.clone(),
                max_connections: 10,
                migrate: o.migrate,
            };
        } else if let Some(base_url) = &o.gateway_url {
            self.store = StoreConfig::Gateway {
                base_url: base_url.clone(),
                api_key: o.gateway_key.clone().unwrap_or_default(),
                schema: None,
            };
        }
        if o.migrate {
            if let StoreConfig::Postgres { migrate, .. } = &mut self.store {
                *migrate = true;
            }
        }
        if let Some(source) = &o.seed_source {
            self.seed.source = Some(source.clone());
        }
        if let Some(marker) = &o.seed_marker {
            self.seed.marker_path = marker.clone();
        }
        if let Some(listen) = o.listen {
            self.listen = listen;
        }
    }
}
