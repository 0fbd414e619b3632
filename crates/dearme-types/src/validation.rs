use std::fmt;
use std::path::{Component, Path};

use serde::Serialize;
use validator::ValidateEmail;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level problems with a submitted form. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(valid)` when nothing was pushed, otherwise the collected errors.
    pub fn finish<T>(self, valid: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(valid) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Turns raw submitted input into a value the service layer can trust.
pub trait Validate {
    type Valid;

    fn validate(self) -> Result<Self::Valid, FieldErrors>;
}

// -- Shared checks --

pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

pub fn is_known_timezone(tz: &str) -> bool {
    tz.parse::<chrono_tz::Tz>().is_ok()
}

/// A path that stays inside whatever directory it is joined onto: relative,
/// with only plain segments (no `..`, `.`, root or drive prefix).
pub fn is_contained_path(path: &str) -> bool {
    let path = Path::new(path);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Trimmed, non-empty, at most `max` characters.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    max: usize,
) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(field, "This field is required.");
    } else if trimmed.chars().count() > max {
        errors.push(field, format!("Ensure this value has at most {max} characters."));
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_returns_value_only_when_clean() {
        assert_eq!(FieldErrors::new().finish(7), Ok(7));

        let errors = FieldErrors::single("subject", "This field is required.");
        let result = errors.clone().finish(7);
        assert_eq!(result, Err(errors));
    }

    #[test]
    fn contained_paths_are_plain_relative_segments() {
        assert!(is_contained_path("letters/photo.jpg"));
        assert!(is_contained_path("photo.jpg"));
        assert!(!is_contained_path("/etc/passwd"));
        assert!(!is_contained_path("../secret.txt"));
        assert!(!is_contained_path("letters/../../secret.txt"));
        assert!(!is_contained_path("./photo.jpg"));
        assert!(!is_contained_path(""));
    }

    #[test]
    fn required_text_trims_and_bounds() {
        let mut errors = FieldErrors::new();
        assert_eq!(required_text(&mut errors, "title", "  hi  ", 10), "hi");
        assert!(errors.is_empty());

        required_text(&mut errors, "title", "   ", 10);
        required_text(&mut errors, "subject", "abcdefghijk", 10);
        assert_eq!(errors.len(), 2);
        assert!(errors.has("title"));
        assert!(errors.has("subject"));
    }

    #[test]
    fn email_and_timezone_checks() {
        assert!(is_valid_email("someone@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(is_known_timezone("Europe/Lisbon"));
        assert!(is_known_timezone("UTC"));
        assert!(!is_known_timezone("Mars/Olympus"));
    }

    #[test]
    fn errors_serialize_as_a_list() {
        let errors = FieldErrors::single("entry_date", "duplicate");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "field": "entry_date", "message": "duplicate" }])
        );
    }
}
