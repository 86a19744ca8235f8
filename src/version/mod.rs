//! Version parsing, ordering, and compatibility.
//!
//! A [`Version`] is an ordered sequence of non-negative integers (major,
//! minor, patch, and any further components) with an optional display prefix
//! such as `v`. Ordering is lexicographic on the integer sequence; equality
//! and hashing ignore the prefix.
//!
//! Compatibility between a set of requested versions follows semver caret
//! semantics: every version must satisfy `^min(versions)`, i.e. share the
//! leading nonzero component with the minimum. The check is delegated to the
//! [`semver`] crate; versions shorter than three components are zero-padded
//! for the check only.

use crate::core::error::ComboError;
use semver::VersionReq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An ordered sequence of non-negative integers with an optional string
/// prefix.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    prefix: String,
    components: Vec<u64>,
}

impl Version {
    /// Parses a dotted decimal string with no prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ComboError::InvalidVersion`] when the string is empty or any
    /// component is not a decimal number.
    pub fn parse(s: &str) -> Result<Self, ComboError> {
        Self::parse_prefixed(s, "")
    }

    /// Parses a dotted decimal string preceded by the given prefix.
    ///
    /// The prefix must be present; it is kept for display but ignored by
    /// ordering, equality, and hashing.
    pub fn parse_prefixed(s: &str, prefix: &str) -> Result<Self, ComboError> {
        let invalid = || ComboError::InvalidVersion { value: s.to_string() };

        let bare = s.strip_prefix(prefix).ok_or_else(invalid)?;
        if bare.is_empty() {
            return Err(invalid());
        }

        let components = bare
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { prefix: prefix.to_string(), components })
    }

    /// The integer components, most significant first.
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// This version as a three-component semver value, zero-padding short
    /// versions. Components beyond the third do not participate in
    /// compatibility checks.
    #[must_use]
    pub fn as_semver(&self) -> semver::Version {
        let part = |i: usize| self.components.get(i).copied().unwrap_or(0);
        semver::Version::new(part(0), part(1), part(2))
    }

    /// True when every version in the set satisfies the caret range of the
    /// minimum (`^min` covers all).
    ///
    /// An empty set is trivially compatible.
    pub fn compatible<'a, I>(versions: I) -> Result<bool, ComboError>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let versions: Vec<&Version> = versions.into_iter().collect();
        let Some(min) = versions.iter().min() else {
            return Ok(true);
        };

        let requirement = VersionReq::parse(&format!("^{}", min.as_semver()))?;
        Ok(versions.iter().all(|v| requirement.matches(&v.as_semver())))
    }
}

impl FromStr for Version {
    type Err = ComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        let dotted =
            self.components.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
        write!(f, "{dotted}")
    }
}

// Equality, ordering, and hashing ignore the prefix.

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn parses_dotted_decimals() {
        assert_eq!(v("1.0").components(), &[1, 0]);
        assert_eq!(v("2.10.3").components(), &[2, 10, 3]);
        assert_eq!(v("7").components(), &[7]);
    }

    #[test]
    fn parses_with_prefix() {
        let version = Version::parse_prefixed("v1.4", "v").unwrap();
        assert_eq!(version.components(), &[1, 4]);
        assert_eq!(version.to_string(), "v1.4");
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "1..0", "1.a", "-1.0", "1.0-rc1", "v1.0"] {
            assert!(Version::parse(bad).is_err(), "expected {bad:?} to fail");
        }
        assert!(Version::parse_prefixed("1.0", "v").is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(v("1.9") < v("1.10"));
        assert!(v("1.0") < v("1.0.0"));
        assert!(v("2.0") > v("1.99.99"));
    }

    #[test]
    fn equality_ignores_prefix() {
        let plain = v("1.4");
        let prefixed = Version::parse_prefixed("v1.4", "v").unwrap();
        assert_eq!(plain, prefixed);
    }

    #[test]
    fn caret_compatibility() {
        // Same leading nonzero component
        assert!(Version::compatible([&v("1.1"), &v("1.2")]).unwrap());
        assert!(Version::compatible([&v("1.0.3"), &v("1.9.0"), &v("1.2.2")]).unwrap());

        // Different majors
        assert!(!Version::compatible([&v("1.5"), &v("2.0")]).unwrap());

        // Leading zero: caret pins the first nonzero component
        assert!(!Version::compatible([&v("0.1.2"), &v("0.2.0")]).unwrap());
        assert!(!Version::compatible([&v("0.0.1"), &v("0.0.2")]).unwrap());
        assert!(Version::compatible([&v("0.1.2"), &v("0.1.9")]).unwrap());
    }

    #[test]
    fn singleton_and_empty_sets_are_compatible() {
        assert!(Version::compatible([&v("3.1")]).unwrap());
        assert!(Version::compatible([]).unwrap());
    }

    #[test]
    fn serde_round_trip() {
        let version: Version = serde_json::from_str("\"1.2.3\"").unwrap();
        assert_eq!(version, v("1.2.3"));
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"1.2.3\"");
    }
}
