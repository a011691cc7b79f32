//! Domain model for users, opinions, votes and comments.
//!
//! # Responsibility
//! - Define canonical records used by core business logic.
//! - Own the vote aggregation and popularity classification rule.
//!
//! # Invariants
//! - Every record is identified by a non-nil `Uuid`.
//! - Opinion derived fields are pure functions of its vote ledger.

pub mod comment;
pub mod opinion;
pub mod user;
pub mod validation;
pub mod vote;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
