//! Dotted-numeric design versions
//!
//! A design version is a non-empty sequence of `.`-separated segments, each
//! made only of ASCII digits. Comparison pads the shorter version with zero
//! segments, so `1.0` and `1` are the same version.
//!
//! Non-numeric segments are rejected outright; they are never read as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reasons a version string fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The whole string is empty
    #[error("version string is empty")]
    Empty,

    /// A segment between two dots is empty (e.g. `1..2`, `1.`)
    #[error("version '{version}' has an empty segment at position {position}")]
    EmptySegment { version: String, position: usize },

    /// A segment contains something other than ASCII digits
    #[error("version '{version}' has non-numeric segment '{segment}'")]
    NonNumeric { version: String, segment: String },

    /// A segment does not fit in 64 bits
    #[error("version '{version}' has out-of-range segment '{segment}'")]
    OutOfRange { version: String, segment: String },
}

/// A parsed design version.
///
/// Keeps the original text so markers record exactly what the design said.
#[derive(Debug, Clone)]
pub struct DesignVersion {
    raw: String,
    segments: Vec<u64>,
}

impl DesignVersion {
    /// Parses a dotted numeric version string.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut segments = Vec::new();
        for (position, segment) in raw.split('.').enumerate() {
            if segment.is_empty() {
                return Err(VersionError::EmptySegment {
                    version: raw.to_string(),
                    position,
                });
            }
            // u64::from_str accepts a leading '+', digits only here
            if !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::NonNumeric {
                    version: raw.to_string(),
                    segment: segment.to_string(),
                });
            }
            let value = segment.parse::<u64>().map_err(|_| VersionError::OutOfRange {
                version: raw.to_string(),
                segment: segment.to_string(),
            })?;
            segments.push(value);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Returns the version exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the numeric segments.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Returns true if `self` is strictly newer than `current`.
    ///
    /// An absent current version counts as older than everything.
    pub fn is_newer_than(&self, current: Option<&DesignVersion>) -> bool {
        match current {
            Some(current) => self > current,
            None => true,
        }
    }
}

impl Ord for DesignVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for DesignVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DesignVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DesignVersion {}

impl FromStr for DesignVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DesignVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for DesignVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for DesignVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DesignVersion::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Compares two version strings, returning -1, 0 or 1.
///
/// # Errors
///
/// Fails if either string is not a well-formed dotted numeric version.
pub fn compare(a: &str, b: &str) -> Result<i32, VersionError> {
    let a = DesignVersion::parse(a)?;
    let b = DesignVersion::parse(b)?;
    Ok(match a.cmp(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let v = DesignVersion::parse("1.10.3").unwrap();
        assert_eq!(v.segments(), &[1, 10, 3]);
        assert_eq!(v.as_str(), "1.10.3");
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert_eq!(compare("1.10", "1.9").unwrap(), 1);
        assert_eq!(compare("2", "10").unwrap(), -1);
    }

    #[test]
    fn test_padding_with_zero_segments() {
        assert_eq!(compare("1", "1.0.0").unwrap(), 0);
        assert_eq!(compare("1.0.1", "1").unwrap(), 1);
        assert_eq!(DesignVersion::parse("3.0").unwrap(), DesignVersion::parse("3").unwrap());
    }

    #[test]
    fn test_non_numeric_is_error() {
        assert!(matches!(
            DesignVersion::parse("1.a"),
            Err(VersionError::NonNumeric { .. })
        ));
        assert!(matches!(
            DesignVersion::parse("+1"),
            Err(VersionError::NonNumeric { .. })
        ));
        assert!(matches!(
            DesignVersion::parse("-1"),
            Err(VersionError::NonNumeric { .. })
        ));
        assert!(compare("1.0", "beta").is_err());
    }

    #[test]
    fn test_empty_and_empty_segments() {
        assert_eq!(DesignVersion::parse(""), Err(VersionError::Empty));
        assert!(matches!(
            DesignVersion::parse("1..2"),
            Err(VersionError::EmptySegment { position: 1, .. })
        ));
        assert!(matches!(
            DesignVersion::parse("1."),
            Err(VersionError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_out_of_range_segment() {
        assert!(matches!(
            DesignVersion::parse("99999999999999999999999"),
            Err(VersionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_is_newer_than_absent() {
        let v = DesignVersion::parse("0").unwrap();
        assert!(v.is_newer_than(None));
        assert!(!v.is_newer_than(Some(&v.clone())));
    }

    #[test]
    fn test_serde_as_string() {
        let v = DesignVersion::parse("2.1").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2.1\"");
        let back: DesignVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "2.1");
        assert!(serde_json::from_str::<DesignVersion>("\"x\"").is_err());
    }
}
