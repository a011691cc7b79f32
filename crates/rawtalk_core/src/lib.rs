//! Core domain logic for RawTalk.
//! This crate is the single source of truth for opinion, vote and comment
//! invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::comment::{Comment, CommentId, MAX_COMMENT_CONTENT_CHARS};
pub use model::opinion::{Opinion, OpinionBallot, OpinionId, MAX_OPINION_CONTENT_CHARS};
pub use model::user::{User, UserId};
pub use model::validation::ValidationError;
pub use model::vote::{
    compute_derived, DerivedVoteState, PopularityPolicy, VoteDirection, VoteLedger, VoteOutcome,
    LESS_POPULAR_THRESHOLD,
};
pub use repo::comment_repo::{CommentRepository, SqliteCommentRepository};
pub use repo::opinion_repo::{OpinionListQuery, OpinionRepository, SqliteOpinionRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::comment_service::{CommentService, CommentServiceError};
pub use service::opinion_service::{OpinionService, OpinionServiceError, OpinionServiceResult};
pub use service::user_service::{UserService, UserServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
