//! Version allocation for primary records.
//!
//! Versions are decimal strings counting up from [`INITIAL_VERSION`]. Once a
//! stored version is not a decimal number (or would overflow), subsequent
//! versions are random UUIDs: unique, but no longer ordered.

use uuid::Uuid;

/// Version assigned to a freshly created record.
pub const INITIAL_VERSION: &str = "1";

/// Version that follows `current`.
pub fn next_version(current: Option<&str>) -> String {
    match current.and_then(parse_numeric) {
        Some(n) => match n.checked_add(1) {
            Some(next) => next.to_string(),
            None => opaque_version(),
        },
        None => opaque_version(),
    }
}

/// Whether `version` is part of the ordered numeric sequence.
pub fn is_numeric(version: &str) -> bool {
    parse_numeric(version).is_some()
}

/// A fresh globally unique version token.
pub fn opaque_version() -> String {
    Uuid::new_v4().to_string()
}

fn parse_numeric(version: &str) -> Option<u64> {
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    version.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_versions_increment_by_one() {
        assert_eq!(next_version(Some("1")), "2");
        assert_eq!(next_version(Some("41")), "42");
    }

    #[test]
    fn signs_and_whitespace_are_not_numeric() {
        for v in ["+1", "-1", " 1", "1 ", "1.0", "", "0x1"] {
            assert!(!is_numeric(v), "{v:?} should not be numeric");
        }
    }

    #[test]
    fn non_numeric_version_falls_back_to_uuid() {
        let next = next_version(Some("alpha"));
        assert!(Uuid::parse_str(&next).is_ok());
        assert!(!is_numeric(&next));
    }

    #[test]
    fn missing_version_falls_back_to_uuid() {
        assert!(Uuid::parse_str(&next_version(None)).is_ok());
    }

    #[test]
    fn overflow_falls_back_to_uuid() {
        let max = u64::MAX.to_string();
        assert!(Uuid::parse_str(&next_version(Some(&max))).is_ok());
    }

    #[test]
    fn opaque_versions_are_unique() {
        let a = next_version(Some("alpha"));
        let b = next_version(Some(&a));
        assert_ne!(a, b);
    }
}
