//! Comment use-case service.
//!
//! # Invariants
//! - Comments can only be added to, or listed for, an existing opinion.
//! - Only the comment author may delete a comment.

use crate::model::comment::{Comment, CommentId};
use crate::model::opinion::OpinionId;
use crate::model::user::UserId;
use crate::model::validation::ValidationError;
use crate::repo::comment_repo::CommentRepository;
use crate::repo::opinion_repo::OpinionRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CommentServiceError {
    Validation(ValidationError),
    OpinionNotFound(OpinionId),
    CommentNotFound(CommentId),
    NotAuthor { comment: CommentId, actor: UserId },
    /// Author is not a registered user.
    UnknownUser(String),
    Repo(RepoError),
}

impl Display for CommentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::OpinionNotFound(id) => write!(f, "opinion not found: {id}"),
            Self::CommentNotFound(id) => write!(f, "comment not found: {id}"),
            Self::NotAuthor { comment, actor } => {
                write!(f, "user {actor} is not the author of comment {comment}")
            }
            Self::UnknownUser(details) => write!(f, "unknown user: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CommentServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CommentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "comment",
                id,
            } => Self::CommentNotFound(id),
            RepoError::NotFound {
                entity: "opinion",
                id,
            } => Self::OpinionNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::MissingReference(details) => Self::UnknownUser(details),
            other => Self::Repo(other),
        }
    }
}

/// Comment service over comment and opinion repositories.
pub struct CommentService<C: CommentRepository, O: OpinionRepository> {
    comments: C,
    opinions: O,
}

impl<C: CommentRepository, O: OpinionRepository> CommentService<C, O> {
    pub fn new(comments: C, opinions: O) -> Self {
        Self { comments, opinions }
    }

    pub fn add_comment(
        &self,
        opinion: OpinionId,
        author: UserId,
        content: &str,
    ) -> Result<Comment, CommentServiceError> {
        self.require_opinion(opinion)?;
        let comment = Comment::new(opinion, author, content)?;
        self.comments.create_comment(&comment)?;
        info!(
            "event=comment_create module=comment status=ok comment={} opinion={}",
            comment.uuid, opinion
        );
        Ok(comment)
    }

    /// Lists comments oldest first.
    pub fn list_comments(
        &self,
        opinion: OpinionId,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<Comment>, CommentServiceError> {
        self.require_opinion(opinion)?;
        Ok(self.comments.list_comments(opinion, limit, offset)?)
    }

    pub fn delete_comment(&self, actor: UserId, id: CommentId) -> Result<(), CommentServiceError> {
        let comment = self
            .comments
            .get_comment(id)?
            .ok_or(CommentServiceError::CommentNotFound(id))?;
        if comment.author != actor {
            return Err(CommentServiceError::NotAuthor { comment: id, actor });
        }

        self.comments.delete_comment(id)?;
        info!("event=comment_delete module=comment status=ok comment={id}");
        Ok(())
    }

    fn require_opinion(&self, opinion: OpinionId) -> Result<(), CommentServiceError> {
        if self.opinions.get_opinion(opinion)?.is_none() {
            return Err(CommentServiceError::OpinionNotFound(opinion));
        }
        Ok(())
    }
}
