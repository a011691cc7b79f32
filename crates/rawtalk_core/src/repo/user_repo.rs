//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Emails are stored normalized; lookups normalize their input too.
//! - A duplicate email surfaces as `RepoError::Conflict`.

use crate::db::migrations::ensure_migrated;
use crate::model::user::{normalize_email, User, UserId};
use crate::repo::{constraint_kind, parse_uuid_column, ConstraintKind, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    first_name,
    last_name,
    email,
    created_at
FROM users";

/// Repository interface for registered users.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Wraps a connection after checking that migrations were applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO users (uuid, first_name, last_name, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                user.uuid.to_string(),
                user.first_name.as_str(),
                user.last_name.as_deref(),
                user.email.as_str(),
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(user.uuid),
            Err(err) if constraint_kind(&err) == Some(ConstraintKind::Unique) => Err(
                RepoError::Conflict(format!("user already exists for email `{}`", user.email)),
            ),
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = normalize_email(email)?;
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE email = ?1;"),
                [email],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let user = User {
        uuid: parse_uuid_column(row, "uuid", "users")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
    };
    user.validate()
        .map_err(|err| RepoError::InvalidData(format!("users row {}: {err}", user.uuid)))?;
    Ok(user)
}
