//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum length of a student identifier.
pub const MAX_STUDENT_ID_LENGTH: usize = 50;

/// Largest accepted offset from UTC in minutes (UTC+14 / UTC-14).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

lazy_static! {
    static ref PIN_REGEX: Regex = Regex::new(r"^[0-9]{4,10}$").unwrap();
}

/// Validates a scanner PIN: 4 to 10 ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if PIN_REGEX.is_match(pin) {
        Ok(())
    } else {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must be 4 to 10 digits".into());
        Err(err)
    }
}

/// Validates a scanned student identifier.
///
/// Whitespace is ignored at both ends. The trimmed value must be
/// non-empty and at most 50 characters.
pub fn validate_student_id(student_id: &str) -> Result<(), ValidationError> {
    let trimmed = student_id.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("student_id_required");
        err.message = Some("Student ID must not be empty".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_STUDENT_ID_LENGTH {
        let mut err = ValidationError::new("student_id_length");
        err.message = Some("Student ID must be at most 50 characters".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a UTC offset in minutes used for calendar-day bucketing.
pub fn validate_utc_offset_minutes(offset: i32) -> Result<(), ValidationError> {
    if (-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset) {
        Ok(())
    } else {
        let mut err = ValidationError::new("utc_offset_range");
        err.message = Some("UTC offset must be between -840 and 840 minutes".into());
        Err(err)
    }
}

/// Validates that a free-text field is not blank after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
