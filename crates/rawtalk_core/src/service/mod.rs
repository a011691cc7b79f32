//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce ownership rules (only authors edit or delete their records).
//! - Keep external callers decoupled from storage details.

pub mod comment_service;
pub mod opinion_service;
pub mod user_service;
