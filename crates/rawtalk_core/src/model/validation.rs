//! Field validation shared by all domain records.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Validation failure for a domain record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier field is the nil UUID.
    NilId { field: &'static str },
    /// Text field is empty after trim.
    EmptyText { field: &'static str },
    /// Text field is shorter than the minimum after trim.
    TextTooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
    /// Text field is longer than the maximum after trim.
    TextTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    /// Email does not have a `local@domain` shape.
    InvalidEmail(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId { field } => write!(f, "{field} must not be nil"),
            Self::EmptyText { field } => write!(f, "{field} must not be blank"),
            Self::TextTooShort { field, min, actual } => write!(
                f,
                "{field} must be at least {min} characters, got {actual}"
            ),
            Self::TextTooLong { field, max, actual } => {
                write!(f, "{field} must be at most {max} characters, got {actual}")
            }
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_id(field: &'static str, id: Uuid) -> Result<Uuid, ValidationError> {
    if id.is_nil() {
        return Err(ValidationError::NilId { field });
    }
    Ok(id)
}

/// Trims `value` and checks its length in chars against `min..=max`.
pub(crate) fn normalize_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText { field });
    }

    let actual = trimmed.chars().count();
    if actual < min {
        return Err(ValidationError::TextTooShort { field, min, actual });
    }
    if actual > max {
        return Err(ValidationError::TextTooLong { field, max, actual });
    }
    Ok(trimmed.to_string())
}
