//! Hierarchy Query Composer.
//!
//! Given a query code, decide which levels to fetch and assemble the
//! results into a [`HierarchyBundle`]:
//!
//! | depth | own (exact) | context (exact)      | children (prefix) |
//! |-------|-------------|----------------------|-------------------|
//! | 1     | level 1     |                      | level 2           |
//! | 2     | level 2     |                      | levels 3 and 4    |
//! | 3     | level 3     | level 2, 2 segments  | level 4           |
//! | ≥ 4   | level 4     | level 3, 3 segments  |                   |
//!
//! Every fetch lands in the slot of its level, so slots never collide.

use futures::future::join_all;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wilayah_code::{Level, RegionCode};
use wilayah_storage::{Region, RegionStore, StoreError};

/// What a fetch contributes to the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchRole {
    /// The queried region itself.
    Own,
    /// The enclosing region one level up.
    Context,
    /// Regions below the queried one.
    Children,
}

/// One store lookup planned for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub role: FetchRole,
    pub level: Level,
    /// Exact code for `Own`/`Context`, parent code for `Children`.
    pub code: RegionCode,
}

impl Fetch {
    fn new(role: FetchRole, level: Level, code: RegionCode) -> Self {
        Self { role, level, code }
    }

    async fn run(&self, store: &dyn RegionStore) -> Result<Vec<Region>, StoreError> {
        match self.role {
            FetchRole::Own | FetchRole::Context => {
                store.exact_by_level(self.level, &self.code).await
            }
            FetchRole::Children => store.prefix_by_level(self.level, &self.code).await,
        }
    }
}

/// The fetches a query code needs, classified by its depth.
pub fn plan(code: &RegionCode) -> Vec<Fetch> {
    use FetchRole::{Children, Context, Own};
    use Level::{District, Province, Regency, Village};

    match code.depth() {
        1 => vec![
            Fetch::new(Own, Province, code.clone()),
            Fetch::new(Children, Regency, code.clone()),
        ],
        2 => vec![
            Fetch::new(Own, Regency, code.clone()),
            Fetch::new(Children, District, code.clone()),
            Fetch::new(Children, Village, code.clone()),
        ],
        3 => vec![
            Fetch::new(Own, District, code.clone()),
            Fetch::new(Context, Regency, code.truncate(Regency.segments())),
            Fetch::new(Children, Village, code.clone()),
        ],
        _ => vec![
            Fetch::new(Own, Village, code.clone()),
            Fetch::new(Context, District, code.truncate(District.segments())),
        ],
    }
}

/// Per-level results of one hierarchy query.
///
/// Serializes with every slot present; a slot nothing was found for is
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyBundle {
    pub code: RegionCode,
    pub depth: usize,
    pub top: Option<FeatureCollection>,
    pub second: Option<FeatureCollection>,
    pub third: Option<FeatureCollection>,
    pub fourth: Option<FeatureCollection>,
}

impl HierarchyBundle {
    fn empty(code: &RegionCode) -> Self {
        Self {
            code: code.clone(),
            depth: code.depth(),
            top: None,
            second: None,
            third: None,
            fourth: None,
        }
    }

    pub fn slot(&self, level: Level) -> Option<&FeatureCollection> {
        match level {
            Level::Province => self.top.as_ref(),
            Level::Regency => self.second.as_ref(),
            Level::District => self.third.as_ref(),
            Level::Village => self.fourth.as_ref(),
        }
    }

    fn slot_mut(&mut self, level: Level) -> &mut Option<FeatureCollection> {
        match level {
            Level::Province => &mut self.top,
            Level::Regency => &mut self.second,
            Level::District => &mut self.third,
            Level::Village => &mut self.fourth,
        }
    }

    pub fn is_empty(&self) -> bool {
        Level::ALL.iter().all(|level| self.slot(*level).is_none())
    }
}

/// Run every planned fetch concurrently and assemble the bundle.
///
/// A failed fetch leaves its slot empty. The query fails only when every
/// fetch failed because the store was unreachable.
pub async fn compose(
    store: &dyn RegionStore,
    code: &RegionCode,
) -> Result<HierarchyBundle, StoreError> {
    let fetches = plan(code);
    let results = join_all(fetches.iter().map(|fetch| fetch.run(store))).await;

    let mut bundle = HierarchyBundle::empty(code);
    let mut unavailable = Vec::new();

    for (fetch, result) in fetches.iter().zip(results) {
        match result {
            Ok(regions) if regions.is_empty() => {}
            Ok(regions) => *bundle.slot_mut(fetch.level) = Some(collection(regions)),
            Err(err) => {
                tracing::warn!(
                    code = %code,
                    fetch_code = %fetch.code,
                    slot = fetch.level.slot_name(),
                    role = ?fetch.role,
                    error = %err,
                    "hierarchy fetch failed"
                );
                if err.is_unavailable() {
                    unavailable.push(err);
                }
            }
        }
    }

    if unavailable.len() == fetches.len() {
        if let Some(err) = unavailable.into_iter().next() {
            return Err(err);
        }
    }
    Ok(bundle)
}

fn collection(regions: Vec<Region>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: regions.into_iter().map(feature).collect(),
        foreign_members: None,
    }
}

fn feature(region: Region) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), Value::String(region.name));
    properties.insert("id".to_string(), Value::String(region.code.to_string()));
    Feature {
        bbox: None,
        geometry: region.geometry,
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
