//! Opinion use-case service.
//!
//! # Responsibility
//! - Provide create/edit/delete/list entry points for opinions.
//! - Route every vote through the repository's atomic update cycle.
//!
//! # Invariants
//! - Only the author may edit or delete an opinion.
//! - Vote operations never fail for a well-formed voter on an existing
//!   opinion; repeated and never-cast votes are no-ops.

use crate::model::opinion::{Opinion, OpinionId};
use crate::model::user::UserId;
use crate::model::validation::{require_id, ValidationError};
use crate::model::vote::{VoteDirection, VoteOutcome};
use crate::repo::opinion_repo::{OpinionListQuery, OpinionRepository};
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for opinion use-cases.
#[derive(Debug)]
pub enum OpinionServiceError {
    /// Input failed field validation.
    Validation(ValidationError),
    /// Target opinion does not exist.
    OpinionNotFound(OpinionId),
    /// Actor is not the opinion's author.
    NotAuthor { opinion: OpinionId, actor: UserId },
    /// Author or voter is not a registered user.
    UnknownUser(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for OpinionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::OpinionNotFound(id) => write!(f, "opinion not found: {id}"),
            Self::NotAuthor { opinion, actor } => {
                write!(f, "user {actor} is not the author of opinion {opinion}")
            }
            Self::UnknownUser(details) => write!(f, "unknown user: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent opinion state: {details}")
            }
        }
    }
}

impl Error for OpinionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for OpinionServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for OpinionServiceError {
    fn from(value: RepoError) -> Self {
        match value {
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

pub type OpinionServiceResult<T> = Result<T, OpinionServiceError>;

/// Opinion service facade over repository implementations.
pub struct OpinionService<R: OpinionRepository> {
    repo: R,
}

impl<R: OpinionRepository> OpinionService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Publishes a new opinion with empty vote state.
    pub fn create_opinion(&self, author: UserId, content: &str) -> OpinionServiceResult<Opinion> {
        let opinion = Opinion::new(author, content)?;
        let id = self.repo.create_opinion(&opinion)?;
        info!(
            "event=opinion_create module=opinion status=ok opinion={} author={}",
            id, author
        );

        self.repo
            .get_opinion(id)?
            .ok_or(OpinionServiceError::InconsistentState(
                "created opinion not found in read-back",
            ))
    }

    pub fn get_opinion(&self, id: OpinionId) -> OpinionServiceResult<Opinion> {
        self.repo
            .get_opinion(id)?
            .ok_or(OpinionServiceError::OpinionNotFound(id))
    }

    /// Lists opinions newest first. Less-popular opinions are hidden unless
    /// `query.include_less_popular` is set.
    pub fn list_feed(&self, query: &OpinionListQuery) -> OpinionServiceResult<Vec<Opinion>> {
        Ok(self.repo.list_opinions(query)?)
    }

    /// Replaces an opinion's content. Votes are untouched.
    pub fn edit_opinion(
        &self,
        actor: UserId,
        id: OpinionId,
        content: &str,
    ) -> OpinionServiceResult<Opinion> {
        self.require_author(actor, id)?;
        self.repo.update_content(id, content)?;
        info!("event=opinion_edit module=opinion status=ok opinion={id}");

        self.repo
            .get_opinion(id)?
            .ok_or(OpinionServiceError::InconsistentState(
                "edited opinion not found in read-back",
            ))
    }

    /// Deletes an opinion together with its votes and comments.
    pub fn delete_opinion(&self, actor: UserId, id: OpinionId) -> OpinionServiceResult<()> {
        self.require_author(actor, id)?;
        self.repo.delete_opinion(id)?;
        info!("event=opinion_delete module=opinion status=ok opinion={id}");
        Ok(())
    }

    /// Casts `voter`'s vote, replacing any opposite vote they had.
    pub fn cast_vote(
        &self,
        id: OpinionId,
        voter: UserId,
        direction: VoteDirection,
    ) -> OpinionServiceResult<(Opinion, VoteOutcome)> {
        require_id("voter", voter)?;
        let (opinion, (outcome, was_less_popular)) = self.repo.update_votes(id, |opinion| {
            let was_less_popular = opinion.is_less_popular();
            (opinion.apply_vote(voter, direction), was_less_popular)
        })?;

        info!(
            "event=vote_cast module=opinion status=ok opinion={} direction={} outcome={:?} score={}",
            id,
            direction.as_str(),
            outcome,
            opinion.score()
        );
        log_popularity_change(&opinion, was_less_popular);
        Ok((opinion, outcome))
    }

    /// Removes `voter`'s vote. Returns the retracted direction, or `None`
    /// when the voter had not voted.
    pub fn retract_vote(
        &self,
        id: OpinionId,
        voter: UserId,
    ) -> OpinionServiceResult<(Opinion, Option<VoteDirection>)> {
        require_id("voter", voter)?;
        let (opinion, (retracted, was_less_popular)) = self.repo.update_votes(id, |opinion| {
            let was_less_popular = opinion.is_less_popular();
            (opinion.retract_vote(&voter), was_less_popular)
        })?;

        info!(
            "event=vote_retract module=opinion status=ok opinion={} retracted={} score={}",
            id,
            retracted.map_or("none", VoteDirection::as_str),
            opinion.score()
        );
        log_popularity_change(&opinion, was_less_popular);
        Ok((opinion, retracted))
    }

    fn require_author(&self, actor: UserId, id: OpinionId) -> OpinionServiceResult<()> {
        let opinion = self.get_opinion(id)?;
        if opinion.author() != actor {
            return Err(OpinionServiceError::NotAuthor { opinion: id, actor });
        }
        Ok(())
    }
}

fn log_popularity_change(opinion: &Opinion, was_less_popular: bool) {
    if opinion.is_less_popular() != was_less_popular {
        info!(
            "event=popularity_change module=opinion status=ok opinion={} is_less_popular={} score={}",
            opinion.uuid(),
            opinion.is_less_popular(),
            opinion.score()
        );
    }
}
