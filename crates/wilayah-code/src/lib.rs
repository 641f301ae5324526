//! Wilayah region codes
//!
//! This crate defines the canonical key space shared by every other Wilayah
//! crate:
//!
//! ```text
//!   level 1 (province)   11
//!   level 2 (regency)    11.01
//!   level 3 (district)   11.01.05
//!   level 4 (village)    11.01.05.2003
//! ```
//!
//! A code's segment count *is* its level, and a child code is always its
//! parent code followed by [`SEPARATOR`] and one more segment. There is no
//! other containment mechanism, so everything that builds or compares codes
//! goes through [`RegionCode`].
//!
//! Raw boundary files carry their codes in level-specific property bags with
//! inconsistent digit widths. [`derive`] turns one of those bags
//! ([`RawProperties`]) into a [`DerivedRegion`] with a canonical code.

pub mod code;
pub mod derive;
pub mod level;
pub mod raw;

pub use code::{CodeError, RegionCode, SEPARATOR};
pub use derive::{derive, DeriveError, DerivedRegion, VILLAGE_CODE_PREFIX};
pub use level::Level;
pub use raw::{DistrictFields, ProvinceFields, RawProperties, RegencyFields, VillageFields};
