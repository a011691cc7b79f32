//! User registration service.
//!
//! # Invariants
//! - Emails are unique after normalization (trim + lowercase).

use crate::model::user::{normalize_email, User, UserId};
use crate::model::validation::ValidationError;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from user service operations.
#[derive(Debug)]
pub enum UserServiceError {
    Validation(ValidationError),
    /// Another user already registered this email.
    EmailTaken(String),
    UserNotFound(UserId),
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::EmailTaken(email) => write!(f, "email already registered: {email}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for UserServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new user profile.
    ///
    /// # Errors
    /// - `Validation` for malformed names or email.
    /// - `EmailTaken` when the normalized email is already registered.
    pub fn register_user(
        &self,
        first_name: &str,
        last_name: Option<&str>,
        email: &str,
    ) -> Result<User, UserServiceError> {
        let email = normalize_email(email)?;
        if self.repo.find_user_by_email(&email)?.is_some() {
            return Err(UserServiceError::EmailTaken(email));
        }

        let user = User::new(first_name, last_name, &email)?;
        match self.repo.create_user(&user) {
            Ok(_) => {}
            // Lost a race with a concurrent registration.
            Err(RepoError::Conflict(_)) => return Err(UserServiceError::EmailTaken(email)),
            Err(err) => return Err(err.into()),
        }

        info!("event=user_register module=user status=ok user={}", user.uuid);
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User, UserServiceError> {
        self.repo
            .get_user(id)?
            .ok_or(UserServiceError::UserNotFound(id))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repo.find_user_by_email(email)?)
    }
}
