//! Hierarchy levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth in the four-tier administrative hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    /// Provinsi
    Province = 1,
    /// Kabupaten / kota
    Regency = 2,
    /// Kecamatan
    District = 3,
    /// Desa / kelurahan
    Village = 4,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Province,
        Level::Regency,
        Level::District,
        Level::Village,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(Level::Province),
            2 => Some(Level::Regency),
            3 => Some(Level::District),
            4 => Some(Level::Village),
            _ => None,
        }
    }

    /// Number of code segments a region at this level carries.
    pub fn segments(self) -> usize {
        self as usize
    }

    /// Level whose codes have exactly `depth` segments.
    pub fn from_depth(depth: usize) -> Option<Self> {
        u8::try_from(depth).ok().and_then(Self::from_u8)
    }

    pub fn parent(self) -> Option<Self> {
        Self::from_u8(self.as_u8() - 1)
    }

    pub fn child(self) -> Option<Self> {
        Self::from_u8(self.as_u8() + 1)
    }

    /// Key under which this level's regions appear in a hierarchy bundle.
    pub fn slot_name(self) -> &'static str {
        match self {
            Level::Province => "top",
            Level::Regency => "second",
            Level::District => "third",
            Level::Village => "fourth",
        }
    }

    /// Detect the level a source batch was declared for.
    ///
    /// Source tags are the names boundary files are published under
    /// (`provinsi`, `kabupaten`, `kecamatan`, `desa`, their English
    /// equivalents, or a bare digit). A tag may also be a file stem such as
    /// `kecamatan_aceh`; the first recognised token wins.
    pub fn from_source_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        if let Some(level) = Self::from_tag_token(&tag) {
            return Some(level);
        }
        tag.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .find_map(Self::from_tag_token)
    }

    fn from_tag_token(token: &str) -> Option<Self> {
        match token {
            "1" | "provinsi" | "province" | "prov" => Some(Level::Province),
            "2" | "kabupaten" | "kota" | "kabkota" | "regency" | "city" | "kab" => {
                Some(Level::Regency)
            }
            "3" | "kecamatan" | "district" | "kec" => Some(Level::District),
            "4" | "desa" | "kelurahan" | "village" | "kel" => Some(Level::Village),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_u8(n).ok_or_else(|| format!("level must be 1..=4, got {n}"))
    }
}
