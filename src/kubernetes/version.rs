// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes version parsing and comparison
//!
//! Versions are compared as numeric `(major, minor, patch)` tuples. A leading
//! non-numeric prefix (`v`) is dropped, a missing patch is 0, and a `-` or `+`
//! suffix after the last number (`+k3s1`, `-eks-4f4795d`) is ignored. Anything
//! else trailing the numbers makes the version unparseable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{EvaluationError, SpecError};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^0-9]*(\d+)\.(\d+)(?:\.(\d+))?(?:[-+].*)?$").expect("valid version regex")
});

/// Parsed Kubernetes version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KubeVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl KubeVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for KubeVersion {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || EvaluationError::VersionParse {
            version: s.to_string(),
        };
        let caps = VERSION_RE.captures(s.trim()).ok_or_else(parse_error)?;
        let component = |i: usize| -> Result<u64, EvaluationError> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| parse_error()),
                None => Ok(0),
            }
        };
        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }
}

impl fmt::Display for KubeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How a cluster version is compared with the constraint version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
}

impl Comparison {
    /// Whether `ordering` (cluster compared to target) satisfies the comparison
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equal => ordering == Ordering::Equal,
            Comparison::NotEqual => ordering != Ordering::Equal,
            Comparison::GreaterThan => ordering == Ordering::Greater,
            Comparison::LessThan => ordering == Ordering::Less,
            Comparison::GreaterThanOrEqualTo => ordering != Ordering::Less,
            Comparison::LessThanOrEqualTo => ordering != Ordering::Greater,
        }
    }
}

impl FromStr for Comparison {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Equal" => Ok(Comparison::Equal),
            "NotEqual" => Ok(Comparison::NotEqual),
            "GreaterThan" => Ok(Comparison::GreaterThan),
            "LessThan" => Ok(Comparison::LessThan),
            "GreaterThanOrEqualTo" => Ok(Comparison::GreaterThanOrEqualTo),
            "LessThanOrEqualTo" => Ok(Comparison::LessThanOrEqualTo),
            other => Err(SpecError::UnknownComparison(other.to_string())),
        }
    }
}

/// Compare a reported cluster version string against an already parsed target
///
/// An unparseable cluster version is an error; callers treat it as non-matching.
pub fn compare_versions(
    cluster_version: &str,
    target: KubeVersion,
    comparison: Comparison,
) -> Result<bool, EvaluationError> {
    let current: KubeVersion = cluster_version.parse()?;
    Ok(comparison.accepts(current.cmp(&target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> KubeVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_plain_and_prefixed() {
        assert_eq!(v("1.28.3"), KubeVersion::new(1, 28, 3));
        assert_eq!(v("v1.28.3"), KubeVersion::new(1, 28, 3));
        assert_eq!(v("v1.28"), KubeVersion::new(1, 28, 0));
    }

    #[test]
    fn test_parse_ignores_build_metadata() {
        assert_eq!(v("v1.28.3+k3s1"), KubeVersion::new(1, 28, 3));
        assert_eq!(v("v1.27.2-eks-4f4795d"), KubeVersion::new(1, 27, 2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("latest".parse::<KubeVersion>().is_err());
        assert!("".parse::<KubeVersion>().is_err());
        assert!("v1".parse::<KubeVersion>().is_err());
        assert!("1.x.3".parse::<KubeVersion>().is_err());
    }

    #[test]
    fn test_parse_rejects_trailing_junk() {
        assert!("1.2.3garbage".parse::<KubeVersion>().is_err());
        assert!("v1.28.x".parse::<KubeVersion>().is_err());
        assert!("1.28.3.4".parse::<KubeVersion>().is_err());
        assert!(matches!(
            compare_versions("1.30.3garbage", v("1.29.0"), Comparison::GreaterThanOrEqualTo),
            Err(EvaluationError::VersionParse { .. })
        ));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        // "v1.9.0" < "v1.10.0" fails under string comparison
        assert!(compare_versions("v1.9.0", v("v1.10.0"), Comparison::LessThan).unwrap());
        assert!(!compare_versions("v1.10.0", v("v1.9.0"), Comparison::LessThan).unwrap());
    }

    #[test]
    fn test_all_comparisons() {
        let target = v("1.25.0");
        assert!(compare_versions("v1.25.0", target, Comparison::Equal).unwrap());
        assert!(compare_versions("v1.25.1", target, Comparison::NotEqual).unwrap());
        assert!(compare_versions("v1.26.0", target, Comparison::GreaterThan).unwrap());
        assert!(!compare_versions("v1.25.0", target, Comparison::GreaterThan).unwrap());
        assert!(compare_versions("v1.25.0", target, Comparison::GreaterThanOrEqualTo).unwrap());
        assert!(compare_versions("v1.24.9", target, Comparison::LessThanOrEqualTo).unwrap());
        assert!(!compare_versions("v1.26.0", target, Comparison::LessThanOrEqualTo).unwrap());
    }

    #[test]
    fn test_unparseable_cluster_version_is_error() {
        let err = compare_versions("unknown", v("1.25.0"), Comparison::Equal).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::VersionParse {
                version: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_comparison_from_str() {
        assert_eq!(
            "GreaterThanOrEqualTo".parse::<Comparison>(),
            Ok(Comparison::GreaterThanOrEqualTo)
        );
        assert!("Newer".parse::<Comparison>().is_err());
    }
}
