//! Store contract tests against the in-memory backend

use super::*;
use geo_types::polygon;

fn code(text: &str) -> RegionCode {
    RegionCode::parse(text).unwrap()
}

fn square(offset: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: offset, y: 0.0),
        (x: offset + 1.0, y: 0.0),
        (x: offset + 1.0, y: 1.0),
        (x: offset, y: 1.0),
        (x: offset, y: 0.0),
    ]])
}

fn write(text: &str, name: &str) -> RegionWrite {
    let code = code(text);
    let level = code.level().unwrap();
    RegionWrite {
        code,
        name: name.to_string(),
        level,
        geometry: square(0.0),
    }
}

/// Aceh with two regencies, and a sibling regency sharing the `11.1` text
/// prefix.
async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    for (kode, nama) in [
        ("11", "Aceh"),
        ("11.1", "Kab. Satu"),
        ("11.10", "Kab. Sepuluh"),
        ("11.1.05", "Kec. Lima"),
        ("11.10.05", "Kec. Lain"),
        ("11.1.05.2001", "Desa Satu"),
        ("12", "Sumatera Utara"),
    ] {
        store.upsert(&write(kode, nama)).await.unwrap();
    }
    store
}

// ============================================================================
// Lookups
// ============================================================================

#[tokio::test]
async fn test_prefix_is_separator_aware() {
    let store = seeded().await;

    let districts = store
        .prefix_by_level(Level::District, &code("11.1"))
        .await
        .unwrap();
    let codes: Vec<&str> = districts.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["11.1.05"], "11.10.05 must not leak into 11.1");

    let regencies = store
        .prefix_by_level(Level::Regency, &code("11"))
        .await
        .unwrap();
    let codes: Vec<&str> = regencies.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["11.1", "11.10"]);
}

#[tokio::test]
async fn test_prefix_excludes_the_prefix_itself() {
    let store = seeded().await;
    let provinces = store
        .prefix_by_level(Level::Province, &code("11"))
        .await
        .unwrap();
    assert!(provinces.is_empty());
}

#[tokio::test]
async fn test_exact_respects_level() {
    let store = seeded().await;

    let hit = store.exact_by_level(Level::Province, &code("11")).await.unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].name, "Aceh");
    assert!(matches!(
        hit[0].geometry.as_ref().map(|g| &g.value),
        Some(geojson::Value::MultiPolygon(_))
    ));

    let miss = store.exact_by_level(Level::Regency, &code("11")).await.unwrap();
    assert!(miss.is_empty());
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_upsert_overwrites_and_keeps_created_at() {
    let store = MemoryStore::new();
    let aceh = code("11");

    store.upsert(&write("11", "Aceh")).await.unwrap();
    let created = store.created_at(&aceh).unwrap();

    let mut renamed = write("11", "Nanggroe Aceh Darussalam");
    renamed.geometry = square(5.0);
    store.upsert(&renamed).await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.created_at(&aceh), Some(created));
    let rows = store.exact_by_level(Level::Province, &aceh).await.unwrap();
    assert_eq!(rows[0].name, "Nanggroe Aceh Darussalam");
    assert_eq!(rows[0].geometry, Some(geometry::encode(&square(5.0))));
}

#[tokio::test]
async fn test_repeated_upsert_is_idempotent() {
    let store = MemoryStore::new();
    for _ in 0..3 {
        store.upsert(&write("11.1.05", "Kec. Lima")).await.unwrap();
    }
    assert_eq!(store.len(), 1);
    let counts = store.count_by_prefix(&code("11")).await.unwrap();
    assert_eq!(counts.level3, 1);
}

#[tokio::test]
async fn test_concurrent_upserts_of_one_code_leave_one_row() {
    let store = Arc::new(MemoryStore::new());
    let writes = (0..16).map(|i| {
        let store = Arc::clone(&store);
        async move {
            store
                .upsert(&write("11.1", &format!("Kab. {i}")))
                .await
        }
    });
    for result in futures::future::join_all(writes).await {
        result.unwrap();
    }
    assert_eq!(store.len(), 1);
}

// ============================================================================
// Status and search
// ============================================================================

#[tokio::test]
async fn test_count_by_prefix_includes_the_prefix_row() {
    let store = seeded().await;

    let aceh = store.count_by_prefix(&code("11")).await.unwrap();
    assert_eq!(
        aceh,
        LevelCounts {
            level1: 1,
            level2: 2,
            level3: 2,
            level4: 1
        }
    );
    assert_eq!(aceh.total(), 6);

    let kab = store.count_by_prefix(&code("11.1")).await.unwrap();
    assert_eq!(kab.get(Level::Regency), 1);
    assert_eq!(kab.get(Level::District), 1);
    assert_eq!(kab.get(Level::Village), 1);
}

#[tokio::test]
async fn test_exists_any_at_level() {
    let store = MemoryStore::new();
    assert!(!store.exists_any_at_level(Level::Province).await.unwrap());
    store.upsert(&write("11.1", "Kab. Satu")).await.unwrap();
    assert!(!store.exists_any_at_level(Level::Province).await.unwrap());
    assert!(store.exists_any_at_level(Level::Regency).await.unwrap());
}

#[tokio::test]
async fn test_search_orders_by_level_then_name_and_caps() {
    let store = seeded().await;

    let hits = store.search("satu", 10).await.unwrap();
    let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["Kab. Satu", "Desa Satu"]);

    let capped = store.search("a", 2).await.unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[0].level, Level::Province);
    assert_eq!(capped[0].name, "Aceh");
}

// ============================================================================
// Read-side geometry normalization
// ============================================================================

#[tokio::test]
async fn test_malformed_stored_geometry_reads_as_none() {
    let store = MemoryStore::new();
    store.put_raw(code("11"), "Aceh", Level::Province, Some("{broken".to_string()));
    store.put_raw(code("12"), "Sumatera Utara", Level::Province, None);

    let aceh = store.exact_by_level(Level::Province, &code("11")).await.unwrap();
    assert_eq!(aceh.len(), 1);
    assert_eq!(aceh[0].name, "Aceh");
    assert!(aceh[0].geometry.is_none());

    let sumut = store.exact_by_level(Level::Province, &code("12")).await.unwrap();
    assert!(sumut[0].geometry.is_none());
}

#[tokio::test]
async fn test_open_store_defaults_to_memory() {
    let store = open_store(&StoreConfig::default()).await.unwrap();
    assert_eq!(store.backend(), "memory");
    store.ping().await.unwrap();
}
