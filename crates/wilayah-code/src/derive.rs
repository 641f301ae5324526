//! Code derivation: raw property bag → canonical code + display name.
//!
//! The rules are asymmetric on purpose. Source files disagree about digit
//! widths for the same logical code, and these rules are what make codes
//! from independently published files line up:
//!
//! | level | code |
//! |-------|------|
//! | 1 | `prov` |
//! | 2 | `prov.kab` |
//! | 3 | `prov.kab.last2(kec)` |
//! | 4 | `prov.kab.last2(kec).2kel` |
//!
//! District codes are padded with extra leading digits in some sources, so
//! only their last two characters are kept. Village codes in the raw files
//! are missing the leading `2` carried by the canonical village code.

use crate::{Level, RawProperties, RegionCode, SEPARATOR};
use serde::{Deserialize, Serialize};

/// Literal prepended to the raw village code.
pub const VILLAGE_CODE_PREFIX: &str = "2";

/// Characters of the raw district code that survive derivation.
const DISTRICT_SEGMENT_WIDTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    #[error("level {level} feature is missing required property `{property}`")]
    MissingProperty { level: Level, property: &'static str },
    #[error("level {level} property `{property}` contains the code separator: `{value}`")]
    EmbeddedSeparator {
        level: Level,
        property: &'static str,
        value: String,
    },
}

/// A region identity derived from one raw feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRegion {
    pub code: RegionCode,
    pub name: String,
    pub level: Level,
}

/// Derive the canonical code and display name for a raw feature.
///
/// Pure and deterministic. Every code property of the declared level is
/// required; a missing or blank one is a [`DeriveError`]. A missing name
/// derives an empty display name.
pub fn derive(raw: &RawProperties) -> Result<DerivedRegion, DeriveError> {
    let level = raw.level();
    let req = |value: &Option<String>, property: &'static str| required(level, value, property);

    let (segments, name): (Vec<String>, &Option<String>) = match raw {
        RawProperties::Province(f) => (vec![req(&f.kode_prov, "kode_prov")?], &f.provinsi),
        RawProperties::Regency(f) => (
            vec![req(&f.kode_prov, "kode_prov")?, req(&f.kode_kab, "kode_kab")?],
            &f.kabupaten,
        ),
        RawProperties::District(f) => (
            vec![
                req(&f.kode_prov, "kode_prov")?,
                req(&f.kode_kab, "kode_kab")?,
                last_chars(&req(&f.kode_kec, "kode_kec")?, DISTRICT_SEGMENT_WIDTH),
            ],
            &f.kecamatan,
        ),
        RawProperties::Village(f) => (
            vec![
                req(&f.kode_prov, "kode_prov")?,
                req(&f.kode_kab, "kode_kab")?,
                last_chars(&req(&f.kode_kec, "kode_kec")?, DISTRICT_SEGMENT_WIDTH),
                format!("{VILLAGE_CODE_PREFIX}{}", req(&f.kode_desa, "kode_desa")?),
            ],
            &f.desa,
        ),
    };

    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    Ok(DerivedRegion {
        code: RegionCode::from_segments(&segments),
        name: name.as_deref().map(str::trim).unwrap_or_default().to_string(),
        level,
    })
}

fn required(
    level: Level,
    value: &Option<String>,
    property: &'static str,
) -> Result<String, DeriveError> {
    let value = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(DeriveError::MissingProperty { level, property })?;
    if value.contains(SEPARATOR) {
        return Err(DeriveError::EmbeddedSeparator {
            level,
            property,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// The last `n` characters of `s` (all of `s` when shorter).
fn last_chars(s: &str, n: usize) -> String {
    let skip = s.chars().count().saturating_sub(n);
    s.chars().skip(skip).collect()
}
