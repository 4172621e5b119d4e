//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time. Each delegates to the domain rule so the CLI
//! and the services reject the same values.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{normalize_code, validate_title as domain_validate_title};

/// Validate a bug title (non-blank, at most 200 characters).
pub fn validate_title(s: &str) -> Result<String, String> {
    domain_validate_title(s).map_err(|e| e.to_string())
}

/// Validate and normalize a project code (trimmed, upper-cased).
pub fn validate_code(s: &str) -> Result<String, String> {
    normalize_code(s).map_err(|e| e.to_string())
}

/// Validate a user, team, project or bug id: non-blank, no whitespace.
pub fn validate_id(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("ID cannot be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err(format!("Invalid ID '{s}': whitespace is not allowed"));
    }
    Ok(s.to_string())
}

/// Parse a report bound: `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("Invalid date: '{s}'"));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("Invalid date: '{s}'. Expected YYYY-MM-DD or RFC 3339"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::rstest;

    #[test]
    fn test_validate_title_trims() {
        assert_eq!(validate_title("  Login fails  ").unwrap(), "Login fails");
    }

    #[test]
    fn test_validate_title_rejects_blank_and_long() {
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"a".repeat(201)).is_err());
        assert!(validate_title(&"a".repeat(200)).is_ok());
    }

    #[rstest]
    #[case::lowercase("web", "WEB")]
    #[case::padded("  api2 ", "API2")]
    fn test_validate_code_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_code(input).unwrap(), expected);
    }

    #[rstest]
    #[case::too_short("w")]
    #[case::punctuation("WE-B")]
    #[case::too_long("ABCDEFGHIJK")]
    fn test_validate_code_rejects(#[case] input: &str) {
        assert!(validate_code(input).is_err());
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::inner_space("ali ce")]
    fn test_validate_id_rejects(#[case] input: &str) {
        assert!(validate_id(input).is_err());
    }

    #[test]
    fn test_validate_id_trims() {
        assert_eq!(validate_id(" alice ").unwrap(), "alice");
    }

    #[test]
    fn test_parse_date_plain() {
        let dt = parse_date("2024-03-05").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_date_rfc3339() {
        let dt = parse_date("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("yesterday").is_err());
    }
}
