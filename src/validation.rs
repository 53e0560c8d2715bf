//! Record and file validation errors.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must be at least {min}")]
    TooSmall { field: &'static str, min: i64 },
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: i64 },
    #[error("File is larger than {max_mb} MB")]
    FileTooLarge { max_mb: u64 },
    #[error("File type '{extension}' is not allowed (pdf, jpg)")]
    DisallowedExtension { extension: String },
    #[error("{0}")]
    Invalid(String),
}

/// Non-blank text no longer than `max` characters.
pub fn require_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    max_chars(field, Some(value), max)
}

pub fn max_chars(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}
