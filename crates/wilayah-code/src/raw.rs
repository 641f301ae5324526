//! Raw property bags, one fixed shape per level.
//!
//! Boundary files name their properties differently at every level
//! (`provinsi` for a province name, `kecamatan` for a district name, ...).
//! Each shape is a plain struct; absent properties stay `None` so the
//! deriver can report exactly which one was missing. Codes are accepted as
//! JSON strings or numbers, and upper-case keys are accepted as aliases.
//!
//! A numeric code is rendered as written, with no zero padding: `"kode_kab": 1`
//! reads as `"1"`, so the regency derives as `11.1`, not `11.01`. Sources
//! that publish padded codes must publish them as strings.

use crate::Level;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceFields {
    #[serde(default, alias = "KODE_PROV", deserialize_with = "text_or_number")]
    pub kode_prov: Option<String>,
    #[serde(default, alias = "PROVINSI", deserialize_with = "text_or_number")]
    pub provinsi: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegencyFields {
    #[serde(default, alias = "KODE_PROV", deserialize_with = "text_or_number")]
    pub kode_prov: Option<String>,
    #[serde(default, alias = "KODE_KAB", deserialize_with = "text_or_number")]
    pub kode_kab: Option<String>,
    #[serde(default, alias = "KABUPATEN", deserialize_with = "text_or_number")]
    pub kabupaten: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictFields {
    #[serde(default, alias = "KODE_PROV", deserialize_with = "text_or_number")]
    pub kode_prov: Option<String>,
    #[serde(default, alias = "KODE_KAB", deserialize_with = "text_or_number")]
    pub kode_kab: Option<String>,
    #[serde(default, alias = "KODE_KEC", deserialize_with = "text_or_number")]
    pub kode_kec: Option<String>,
    #[serde(default, alias = "KECAMATAN", deserialize_with = "text_or_number")]
    pub kecamatan: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageFields {
    #[serde(default, alias = "KODE_PROV", deserialize_with = "text_or_number")]
    pub kode_prov: Option<String>,
    #[serde(default, alias = "KODE_KAB", deserialize_with = "text_or_number")]
    pub kode_kab: Option<String>,
    #[serde(default, alias = "KODE_KEC", deserialize_with = "text_or_number")]
    pub kode_kec: Option<String>,
    #[serde(default, alias = "KODE_DESA", deserialize_with = "text_or_number")]
    pub kode_desa: Option<String>,
    #[serde(default, alias = "DESA", deserialize_with = "text_or_number")]
    pub desa: Option<String>,
}

/// The property bag of one raw feature, tagged with its declared level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawProperties {
    Province(ProvinceFields),
    Regency(RegencyFields),
    District(DistrictFields),
    Village(VillageFields),
}

impl RawProperties {
    pub fn level(&self) -> Level {
        match self {
            RawProperties::Province(_) => Level::Province,
            RawProperties::Regency(_) => Level::Regency,
            RawProperties::District(_) => Level::District,
            RawProperties::Village(_) => Level::Village,
        }
    }

    /// Deserialize a property bag using the shape of the declared level.
    pub fn deserialize_for<'de, D>(level: Level, deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match level {
            Level::Province => RawProperties::Province(ProvinceFields::deserialize(deserializer)?),
            Level::Regency => RawProperties::Regency(RegencyFields::deserialize(deserializer)?),
            Level::District => RawProperties::District(DistrictFields::deserialize(deserializer)?),
            Level::Village => RawProperties::Village(VillageFields::deserialize(deserializer)?),
        })
    }
}

/// Accept a string, an integer or an integral float, and render it as text.
/// `null` reads as absent.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Unsigned(n)) => Some(n.to_string()),
        Some(Raw::Signed(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) if f.fract() == 0.0 && f.is_finite() => Some(format!("{f:.0}")),
        Some(Raw::Float(f)) => Some(f.to_string()),
    })
}
