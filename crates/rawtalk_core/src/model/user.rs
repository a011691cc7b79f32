//! Registered user identity.
//!
//! Credentials are owned by the authentication layer; this record only
//! carries the profile fields other records reference.

use crate::model::now_epoch_ms;
use crate::model::validation::{normalize_text, require_id, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a registered user. Used as voter and author key.
pub type UserId = Uuid;

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 64;
pub const MIN_EMAIL_CHARS: usize = 5;
pub const MAX_EMAIL_CHARS: usize = 254;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("valid email regex"));

/// Registered user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Lowercased; unique across users.
    pub email: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl User {
    /// Creates a validated user with a generated ID.
    pub fn new(
        first_name: &str,
        last_name: Option<&str>,
        email: &str,
    ) -> Result<Self, ValidationError> {
        let user = Self {
            uuid: Uuid::new_v4(),
            first_name: normalize_text("first_name", first_name, MIN_NAME_CHARS, MAX_NAME_CHARS)?,
            last_name: normalize_last_name(last_name)?,
            email: normalize_email(email)?,
            created_at: now_epoch_ms(),
        };
        Ok(user)
    }

    /// Checks field invariants on an already-built record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("uuid", self.uuid)?;
        normalize_text(
            "first_name",
            &self.first_name,
            MIN_NAME_CHARS,
            MAX_NAME_CHARS,
        )?;
        normalize_last_name(self.last_name.as_deref())?;
        normalize_email(&self.email)?;
        Ok(())
    }

    /// Display name: first and last name joined by a space.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

fn normalize_last_name(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(last) => {
            normalize_text("last_name", last, MIN_NAME_CHARS, MAX_NAME_CHARS).map(Some)
        }
    }
}

/// Trims, lowercases and shape-checks an email address.
pub fn normalize_email(value: &str) -> Result<String, ValidationError> {
    let email = normalize_text("email", value, MIN_EMAIL_CHARS, MAX_EMAIL_CHARS)?.to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::InvalidEmail(email));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, User};
    use crate::model::validation::ValidationError;

    #[test]
    fn new_normalizes_fields() {
        let user = User::new(" Ada ", Some("  "), " Ada@Example.COM ").unwrap();
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, None);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name(), "Ada");
        user.validate().unwrap();
    }

    #[test]
    fn short_names_are_rejected() {
        assert!(matches!(
            User::new("A", None, "a@b.co"),
            Err(ValidationError::TextTooShort { field: "first_name", .. })
        ));
        assert!(matches!(
            User::new("Ada", Some("L"), "a@b.co"),
            Err(ValidationError::TextTooShort { field: "last_name", .. })
        ));
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(matches!(
            normalize_email("no-at-sign"),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(matches!(
            normalize_email("a@b"),
            Err(ValidationError::TextTooShort { field: "email", .. })
        ));
        assert_eq!(normalize_email("x@y.io").unwrap(), "x@y.io");
    }
}
