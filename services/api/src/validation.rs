//! Payload validation helpers
//!
//! Each helper returns `ApiError::BadRequest` naming the offending field.

use crate::error::{ApiError, ApiResult};

/// Trimmed, non-empty text of at most `max` characters
pub fn required_text(field: &str, value: &str, max: usize) -> ApiResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }

    if value.chars().count() > max {
        return Err(ApiError::BadRequest(format!(
            "{} must be at most {} characters long",
            field, max
        )));
    }

    Ok(value.to_string())
}

/// Optional text; blank becomes `None`
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> ApiResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => required_text(field, value, max).map(Some),
    }
}

/// Replacement for a required field in a partial update; present but blank is rejected
pub fn replacement_text(field: &str, value: Option<&str>, max: usize) -> ApiResult<Option<String>> {
    value.map(|value| required_text(field, value, max)).transpose()
}

/// Ratings are whole stars from 1 to 5
pub fn rating(value: i16) -> ApiResult<i16> {
    if (1..=5).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ))
    }
}

pub const TITLE_MAX: usize = 120;
pub const DESCRIPTION_MAX: usize = 2000;
pub const CATEGORY_MAX: usize = 50;
pub const SHORT_TEXT_MAX: usize = 200;
pub const MESSAGE_MAX: usize = 2000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("Title", "  Drill  ", 10).unwrap(), "Drill");
    }

    #[test]
    fn test_required_text_rejects_blank_and_long() {
        let err = required_text("Title", "   ", 10).unwrap_err();
        assert_eq!(err.to_string(), "Title is required");

        let err = required_text("Title", "a very long title", 5).unwrap_err();
        assert_eq!(err.to_string(), "Title must be at most 5 characters long");
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("Location", None, 10).unwrap(), None);
        assert_eq!(optional_text("Location", Some("  "), 10).unwrap(), None);
        assert_eq!(
            optional_text("Location", Some(" Leeds "), 10).unwrap(),
            Some("Leeds".to_string())
        );
        assert!(optional_text("Location", Some("far too long"), 3).is_err());
    }

    #[test]
    fn test_replacement_text() {
        assert_eq!(replacement_text("Title", None, 10).unwrap(), None);
        assert_eq!(
            replacement_text("Title", Some(" Ladder "), 10).unwrap(),
            Some("Ladder".to_string())
        );
        assert!(replacement_text("Title", Some(" "), 10).is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(rating(0).is_err());
        assert_eq!(rating(1).unwrap(), 1);
        assert_eq!(rating(5).unwrap(), 5);
        assert!(rating(6).is_err());
    }
}
