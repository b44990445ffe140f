//! Input guards
//!
//! Primitive checks shared by the form rules and the boundary validators:
//! identifier shape, dates, numeric ranges and text length.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

/// Maximum length of free-text notes
pub const MAX_NOTES_LEN: usize = 2000;

/// Canonical UUID, versions 1 through 5
static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("Invalid UUID regex")
});

/// Whether `value` is a canonical v1-5 UUID
pub fn is_uuid(value: &str) -> bool {
    UUID_PATTERN.is_match(value)
}

/// Validate and parse a UUID identifier
pub fn validate_uuid(value: &str, field: &str) -> ValidationResult<Uuid> {
    if !is_uuid(value) {
        return Err(ValidationError::InvalidUuid {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Uuid::parse_str(value).map_err(|_| ValidationError::InvalidUuid {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a calendar date (`YYYY-MM-DD`, or an RFC 3339 timestamp)
pub fn parse_date(value: &str, field: &str) -> ValidationResult<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| ValidationError::InvalidDate {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Ensure `end` does not precede `start`
pub fn ensure_date_order(
    start: NaiveDate,
    end: NaiveDate,
    start_field: &str,
    end_field: &str,
) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::DateOrder {
            start_field: start_field.to_string(),
            end_field: end_field.to_string(),
        });
    }
    Ok(())
}

/// Ensure a number is finite and not negative
pub fn ensure_non_negative(value: f64, field: &str) -> ValidationResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Ensure text is within `max` characters
pub fn ensure_max_len(value: &str, field: &str, max: usize) -> ValidationResult<()> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

/// Trimmed text, or `None` when blank
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
