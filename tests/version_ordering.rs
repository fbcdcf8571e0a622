//! Version Ordering Tests
//!
//! Properties of dotted-numeric version comparison:
//! - Reflexive: compare(a, a) == 0
//! - Antisymmetric: compare(a, b) == -compare(b, a)
//! - Transitive over a sorted sample
//! - Zero padding: trailing zero segments do not change a version

use designsync::version::{compare, DesignVersion, VersionError};

fn sample() -> Vec<&'static str> {
    vec![
        "0", "0.0.1", "1", "1.0", "1.0.0", "1.1", "1.2", "1.9", "1.10", "1.10.0.0", "2", "2.0.1",
        "10", "18446744073709551615",
    ]
}

// =============================================================================
// Algebraic Properties
// =============================================================================

#[test]
fn test_compare_is_reflexive() {
    for a in sample() {
        assert_eq!(compare(a, a).unwrap(), 0, "{}", a);
    }
}

#[test]
fn test_compare_is_antisymmetric() {
    for a in sample() {
        for b in sample() {
            assert_eq!(compare(a, b).unwrap(), -compare(b, a).unwrap(), "{} vs {}", a, b);
        }
    }
}

#[test]
fn test_compare_is_transitive() {
    let versions = sample();
    for a in &versions {
        for b in &versions {
            for c in &versions {
                if compare(a, b).unwrap() <= 0 && compare(b, c).unwrap() <= 0 {
                    assert!(compare(a, c).unwrap() <= 0, "{} <= {} <= {}", a, b, c);
                }
            }
        }
    }
}

// =============================================================================
// Segment Semantics
// =============================================================================

#[test]
fn test_segments_compare_numerically() {
    assert_eq!(compare("1.10", "1.9").unwrap(), 1);
    assert_eq!(compare("1.2", "1.10").unwrap(), -1);
    assert_eq!(compare("01.2", "1.2").unwrap(), 0);
}

#[test]
fn test_trailing_zeros_are_padding() {
    assert_eq!(compare("1", "1.0.0").unwrap(), 0);
    assert_eq!(compare("1.0.1", "1").unwrap(), 1);

    let a = DesignVersion::parse("2.0").unwrap();
    let b = DesignVersion::parse("2").unwrap();
    assert_eq!(a, b);
    // The written form is kept
    assert_eq!(a.as_str(), "2.0");
}

#[test]
fn test_newer_than_nothing() {
    let v = DesignVersion::parse("0").unwrap();
    assert!(v.is_newer_than(None));
    assert!(!v.is_newer_than(Some(&DesignVersion::parse("0.0").unwrap())));
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_malformed_versions_are_rejected() {
    assert_eq!(DesignVersion::parse("").unwrap_err(), VersionError::Empty);
    assert!(matches!(
        DesignVersion::parse("1..2").unwrap_err(),
        VersionError::EmptySegment { position: 1, .. }
    ));
    assert!(matches!(
        DesignVersion::parse("1.").unwrap_err(),
        VersionError::EmptySegment { position: 1, .. }
    ));
    assert!(matches!(
        DesignVersion::parse("1.beta").unwrap_err(),
        VersionError::NonNumeric { .. }
    ));
    assert!(matches!(
        DesignVersion::parse("+1").unwrap_err(),
        VersionError::NonNumeric { .. }
    ));
    assert!(matches!(
        DesignVersion::parse("18446744073709551616").unwrap_err(),
        VersionError::OutOfRange { .. }
    ));
    assert!(compare("1", "x").is_err());
}
