//! Identifier types and normalization helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PricatError, Result};

/// Length of a Global Location Number
pub const GLN_LENGTH: usize = 13;

/// A 13-digit Global Location Number, the natural key of suppliers and
/// manufacturers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gln(String);

impl Gln {
    /// Parse a GLN, trimming surrounding whitespace
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();

        if trimmed.len() != GLN_LENGTH {
            return Err(PricatError::InvalidGln {
                value: value.to_string(),
                reason: format!("expected {} characters, got {}", GLN_LENGTH, trimmed.len()),
            });
        }

        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PricatError::InvalidGln {
                value: value.to_string(),
                reason: "only digits are allowed".to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Gln {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Gln {
    type Error = PricatError;

    fn try_from(value: String) -> Result<Self> {
        Gln::parse(&value)
    }
}

impl From<Gln> for String {
    fn from(gln: Gln) -> Self {
        gln.0
    }
}

/// Strip leading zeros from a numeric identifier.
///
/// An all-zero identifier keeps a single `0`; an empty one stays empty.
pub fn strip_leading_zeros(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }

    let stripped = value.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Make a name safe for use as a single path segment.
///
/// Runs of anything other than ASCII alphanumerics, `-` and `.` collapse into
/// one `_`.
pub fn sanitize_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;

    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    out.trim_matches('_').to_string()
}

/// Timestamp fragment embedded in generated file names (`20260116_143005`)
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros("0000001872"), "1872");
        assert_eq!(strip_leading_zeros("0000"), "0");
        assert_eq!(strip_leading_zeros(""), "");
        assert_eq!(strip_leading_zeros("1020"), "1020");
    }

    #[test]
    fn test_gln_parse() {
        assert_eq!(Gln::parse(" 4012345000009 ").unwrap().as_str(), "4012345000009");
        assert!(Gln::parse("401234500000").is_err());
        assert!(Gln::parse("40123450000AB").is_err());
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("Lego Spielwaren GmbH"), "Lego_Spielwaren_GmbH");
        assert_eq!(sanitize_segment("  Müller & Söhne  "), "M_ller_S_hne");
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_file_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 16, 14, 30, 5).unwrap();
        assert_eq!(file_timestamp(at), "20260116_143005");
    }

    proptest! {
        #[test]
        fn prop_strip_leading_zeros_keeps_value(n in 0u64..10_000_000, pad in 0usize..8) {
            let padded = format!("{}{}", "0".repeat(pad), n);
            prop_assert_eq!(strip_leading_zeros(&padded), n.to_string());
        }
    }
}
