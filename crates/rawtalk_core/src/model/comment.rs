//! Comment attached to an opinion.

use crate::model::now_epoch_ms;
use crate::model::opinion::OpinionId;
use crate::model::user::UserId;
use crate::model::validation::{normalize_text, require_id, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

/// Maximum comment length in chars, after trim.
pub const MAX_COMMENT_CONTENT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub uuid: CommentId,
    /// Parent opinion. Comments are removed together with it.
    pub opinion: OpinionId,
    pub author: UserId,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Comment {
    pub fn new(opinion: OpinionId, author: UserId, content: &str) -> Result<Self, ValidationError> {
        let comment = Self {
            uuid: Uuid::new_v4(),
            opinion,
            author,
            content: normalize_comment_content(content)?,
            created_at: now_epoch_ms(),
        };
        comment.validate()?;
        Ok(comment)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_id("uuid", self.uuid)?;
        require_id("opinion", self.opinion)?;
        require_id("author", self.author)?;
        normalize_comment_content(&self.content)?;
        Ok(())
    }
}

fn normalize_comment_content(content: &str) -> Result<String, ValidationError> {
    normalize_text("content", content, 1, MAX_COMMENT_CONTENT_CHARS)
}
