//! Canonical dotted region codes.

use crate::Level;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between code segments.
pub const SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("region code is empty")]
    Empty,
    #[error("region code `{0}` has an empty segment")]
    EmptySegment(String),
}

/// A canonical region identifier such as `11.01.05.2003`.
///
/// Segments are kept as text: leading zeros are significant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    /// Parse a code supplied by a caller (query input, stored row).
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CodeError::Empty);
        }
        if s.split(SEPARATOR).any(|seg| seg.trim().is_empty()) {
            return Err(CodeError::EmptySegment(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Join already-validated segments.
    pub(crate) fn from_segments(segments: &[&str]) -> Self {
        let mut out = String::new();
        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(seg);
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Level implied by the segment count, `None` past the leaf level.
    pub fn level(&self) -> Option<Level> {
        Level::from_depth(self.depth())
    }

    /// The first `segments` segments of this code.
    ///
    /// Truncating to at least the current depth returns the code unchanged.
    pub fn truncate(&self, segments: usize) -> Self {
        let segments = segments.max(1);
        match self.0.match_indices(SEPARATOR).nth(segments - 1) {
            Some((idx, _)) => Self(self.0[..idx].to_string()),
            None => self.clone(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(SEPARATOR)
            .map(|idx| Self(self.0[..idx].to_string()))
    }

    /// The string every descendant code starts with: this code plus the
    /// separator. `11.1` yields `11.1.`, so `11.10` is not a descendant.
    pub fn descendant_prefix(&self) -> String {
        let mut prefix = String::with_capacity(self.0.len() + 1);
        prefix.push_str(&self.0);
        prefix.push(SEPARATOR);
        prefix
    }

    pub fn is_ancestor_of(&self, other: &RegionCode) -> bool {
        other.0.starts_with(&self.descendant_prefix())
    }

    /// `true` when `other` is this code or one of its descendants.
    pub fn covers(&self, other: &RegionCode) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for RegionCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RegionCode {
    type Error = CodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RegionCode {
        RegionCode::parse(s).unwrap()
    }

    #[test]
    fn parse_rejects_empty_and_hollow_codes() {
        assert_eq!(RegionCode::parse("   "), Err(CodeError::Empty));
        assert!(matches!(
            RegionCode::parse("11..05"),
            Err(CodeError::EmptySegment(_))
        ));
        assert!(matches!(
            RegionCode::parse("11."),
            Err(CodeError::EmptySegment(_))
        ));
        assert_eq!(code(" 11.01 ").as_str(), "11.01");
    }

    #[test]
    fn depth_maps_to_level() {
        assert_eq!(code("11").level(), Some(Level::Province));
        assert_eq!(code("11.01.05.2003").level(), Some(Level::Village));
        assert_eq!(code("11.01.05.2003.9").depth(), 5);
        assert_eq!(code("11.01.05.2003.9").level(), None);
    }

    #[test]
    fn truncate_keeps_leading_segments() {
        let c = code("11.01.05.2003");
        assert_eq!(c.truncate(1).as_str(), "11");
        assert_eq!(c.truncate(2).as_str(), "11.01");
        assert_eq!(c.truncate(3).as_str(), "11.01.05");
        assert_eq!(c.truncate(4), c);
        assert_eq!(c.truncate(9), c);
    }

    #[test]
    fn parent_drops_the_last_segment() {
        assert_eq!(code("11.01.05").parent(), Some(code("11.01")));
        assert_eq!(code("11").parent(), None);
    }

    #[test]
    fn ancestry_is_separator_aware() {
        let parent = code("11.1");
        assert!(parent.is_ancestor_of(&code("11.1.05")));
        assert!(!parent.is_ancestor_of(&code("11.10")));
        assert!(!parent.is_ancestor_of(&code("11.1")));
        assert!(parent.covers(&code("11.1")));
        assert_eq!(parent.descendant_prefix(), "11.1.");
    }

    #[test]
    fn serde_validates_codes() {
        let c: RegionCode = serde_json::from_str("\"11.01\"").unwrap();
        assert_eq!(c, code("11.01"));
        assert!(serde_json::from_str::<RegionCode>("\"\"").is_err());
    }
}
