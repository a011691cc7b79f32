//! Opinion domain model.
//!
//! # Responsibility
//! - Define the canonical opinion record and its vote state.
//! - Keep `score` and `is_less_popular` consistent with the vote ledger.
//!
//! # Invariants
//! - `uuid` and `author` are non-nil and never change.
//! - `content` is trimmed, non-empty and at most 500 chars.
//! - An identity is an upvoter or a downvoter, never both.
//! - Derived fields are recomputed inside every vote mutation; there is no
//!   other write path to the ledger.
//!
//! # See also
//! - crate::model::vote

use crate::model::now_epoch_ms;
use crate::model::user::UserId;
use crate::model::validation::{normalize_text, require_id, ValidationError};
use crate::model::vote::{
    DerivedVoteState, PopularityPolicy, VoteDirection, VoteLedger, VoteOutcome,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

/// Stable identifier of an opinion.
pub type OpinionId = Uuid;

/// Maximum opinion length in chars, after trim.
pub const MAX_OPINION_CONTENT_CHARS: usize = 500;

/// One user-authored opinion and its vote state.
///
/// Fields are private so that derived state cannot be written directly.
///
/// The serde form carries no policy: deserialized opinions are classified
/// under [`PopularityPolicy::default`]. Use [`Opinion::with_policy`] to
/// reclassify after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OpinionRecord", into = "OpinionRecord")]
pub struct Opinion {
    uuid: OpinionId,
    author: UserId,
    content: String,
    created_at: i64,
    votes: VoteLedger,
    derived: DerivedVoteState,
    policy: PopularityPolicy,
}

/// Two-set wire shape of an opinion.
///
/// Incoming `score` and `is_less_popular` are ignored and recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpinionRecord {
    uuid: OpinionId,
    content: String,
    author: UserId,
    #[serde(default)]
    upvotes: Vec<UserId>,
    #[serde(default)]
    downvotes: Vec<UserId>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_less_popular: bool,
    created_at: i64,
}

impl Opinion {
    /// Creates a new opinion with a generated ID and empty vote state.
    ///
    /// # Errors
    /// - `author` is nil.
    /// - `content` is blank or longer than [`MAX_OPINION_CONTENT_CHARS`].
    pub fn new(author: UserId, content: &str) -> Result<Self, ValidationError> {
        Self::with_id(Uuid::new_v4(), author, content, now_epoch_ms())
    }

    /// Creates an opinion with a caller-provided ID and creation time.
    pub fn with_id(
        uuid: OpinionId,
        author: UserId,
        content: &str,
        created_at: i64,
    ) -> Result<Self, ValidationError> {
        Self::from_parts(
            uuid,
            author,
            content,
            created_at,
            VoteLedger::new(),
            PopularityPolicy::default(),
        )
    }

    /// Rebuilds an opinion from persisted parts, deriving score state.
    pub fn from_parts(
        uuid: OpinionId,
        author: UserId,
        content: &str,
        created_at: i64,
        votes: VoteLedger,
        policy: PopularityPolicy,
    ) -> Result<Self, ValidationError> {
        let mut opinion = Self {
            uuid: require_id("uuid", uuid)?,
            author: require_id("author", author)?,
            content: normalize_opinion_content(content)?,
            created_at,
            votes,
            derived: DerivedVoteState::default(),
            policy,
        };
        opinion.recompute();
        Ok(opinion)
    }

    /// Rebuilds an opinion from independent upvoter/downvoter sets.
    ///
    /// Returns the identities found in both sets. Those identities are
    /// dropped from both and must vote again.
    pub fn from_vote_sets(
        uuid: OpinionId,
        author: UserId,
        content: &str,
        created_at: i64,
        upvoters: impl IntoIterator<Item = UserId>,
        downvoters: impl IntoIterator<Item = UserId>,
    ) -> Result<(Self, Vec<UserId>), ValidationError> {
        let (votes, conflicts) = VoteLedger::from_sets(upvoters, downvoters);
        if !conflicts.is_empty() {
            warn!(
                "event=vote_conflict_repaired module=opinion status=repaired opinion={} conflicts={}",
                uuid,
                conflicts.len()
            );
        }
        let opinion = Self::from_parts(
            uuid,
            author,
            content,
            created_at,
            votes,
            PopularityPolicy::default(),
        )?;
        Ok((opinion, conflicts))
    }

    /// Replaces the classification policy and reclassifies.
    pub fn with_policy(mut self, policy: PopularityPolicy) -> Self {
        self.policy = policy;
        self.recompute();
        self
    }

    pub fn uuid(&self) -> OpinionId {
        self.uuid
    }

    pub fn author(&self) -> UserId {
        self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Unix epoch milliseconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn score(&self) -> i64 {
        self.derived.score
    }

    pub fn is_less_popular(&self) -> bool {
        self.derived.is_less_popular
    }

    pub fn derived(&self) -> DerivedVoteState {
        self.derived
    }

    pub fn policy(&self) -> PopularityPolicy {
        self.policy
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    pub fn upvoters(&self) -> impl Iterator<Item = UserId> + '_ {
        self.votes.voters(VoteDirection::Up)
    }

    pub fn downvoters(&self) -> impl Iterator<Item = UserId> + '_ {
        self.votes.voters(VoteDirection::Down)
    }

    pub fn vote_of(&self, voter: &UserId) -> Option<VoteDirection> {
        self.votes.direction_of(voter)
    }

    /// Casts `voter`'s vote in `direction`.
    ///
    /// Any opposite vote by the same identity is replaced. Repeating the
    /// same vote is a no-op. Never fails.
    pub fn apply_vote(&mut self, voter: UserId, direction: VoteDirection) -> VoteOutcome {
        let outcome = self.votes.set(voter, direction);
        self.recompute();
        outcome
    }

    /// Removes `voter`'s vote, if any, returning the retracted direction.
    pub fn retract_vote(&mut self, voter: &UserId) -> Option<VoteDirection> {
        let retracted = self.votes.remove(voter);
        self.recompute();
        retracted
    }

    /// Replaces content. Vote state is untouched.
    pub fn edit_content(&mut self, content: &str) -> Result<(), ValidationError> {
        self.content = normalize_opinion_content(content)?;
        Ok(())
    }

    fn recompute(&mut self) {
        self.derived = self
            .policy
            .classify(self.votes.upvote_count(), self.votes.downvote_count());
    }
}

/// Vote-only write access to an opinion.
///
/// Handed to the mutation closure of an atomic vote update. Reads go
/// through `Deref`; content and identity cannot be changed here.
pub struct OpinionBallot<'a> {
    opinion: &'a mut Opinion,
}

impl<'a> OpinionBallot<'a> {
    pub fn new(opinion: &'a mut Opinion) -> Self {
        Self { opinion }
    }

    /// See [`Opinion::apply_vote`].
    pub fn apply_vote(&mut self, voter: UserId, direction: VoteDirection) -> VoteOutcome {
        self.opinion.apply_vote(voter, direction)
    }

    /// See [`Opinion::retract_vote`].
    pub fn retract_vote(&mut self, voter: &UserId) -> Option<VoteDirection> {
        self.opinion.retract_vote(voter)
    }
}

impl Deref for OpinionBallot<'_> {
    type Target = Opinion;

    fn deref(&self) -> &Opinion {
        self.opinion
    }
}

/// Trims and bounds opinion text.
pub fn normalize_opinion_content(content: &str) -> Result<String, ValidationError> {
    normalize_text("content", content, 1, MAX_OPINION_CONTENT_CHARS)
}

impl TryFrom<OpinionRecord> for Opinion {
    type Error = ValidationError;

    fn try_from(record: OpinionRecord) -> Result<Self, Self::Error> {
        let (opinion, _) = Self::from_vote_sets(
            record.uuid,
            record.author,
            &record.content,
            record.created_at,
            record.upvotes,
            record.downvotes,
        )?;
        if opinion.score() != record.score || opinion.is_less_popular() != record.is_less_popular
        {
            warn!(
                "event=derived_drift_repaired module=opinion status=repaired opinion={} stored_score={} score={}",
                opinion.uuid,
                record.score,
                opinion.score()
            );
        }
        Ok(opinion)
    }
}

impl From<Opinion> for OpinionRecord {
    fn from(opinion: Opinion) -> Self {
        Self {
            uuid: opinion.uuid,
            upvotes: opinion.upvoters().collect(),
            downvotes: opinion.downvoters().collect(),
            score: opinion.derived.score,
            is_less_popular: opinion.derived.is_less_popular,
            content: opinion.content,
            author: opinion.author,
            created_at: opinion.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Opinion, OpinionBallot, MAX_OPINION_CONTENT_CHARS};
    use crate::model::validation::ValidationError;
    use crate::model::vote::{PopularityPolicy, VoteDirection};
    use uuid::Uuid;

    #[test]
    fn new_trims_content_and_starts_neutral() {
        let opinion = Opinion::new(Uuid::new_v4(), "  pineapple belongs on pizza ").unwrap();
        assert_eq!(opinion.content(), "pineapple belongs on pizza");
        assert_eq!(opinion.score(), 0);
        assert!(!opinion.is_less_popular());
        assert!(opinion.votes().is_empty());
    }

    #[test]
    fn content_bound_is_inclusive() {
        let author = Uuid::new_v4();
        let exact = "x".repeat(MAX_OPINION_CONTENT_CHARS);
        assert!(Opinion::new(author, &exact).is_ok());

        let over = "x".repeat(MAX_OPINION_CONTENT_CHARS + 1);
        assert!(matches!(
            Opinion::new(author, &over),
            Err(ValidationError::TextTooLong { max: 500, actual: 501, .. })
        ));
    }

    #[test]
    fn edit_content_keeps_votes() {
        let mut opinion = Opinion::new(Uuid::new_v4(), "draft").unwrap();
        opinion.apply_vote(Uuid::new_v4(), VoteDirection::Up);

        opinion.edit_content("final").unwrap();
        assert_eq!(opinion.content(), "final");
        assert_eq!(opinion.score(), 1);

        assert!(opinion.edit_content(" ").is_err());
        assert_eq!(opinion.content(), "final");
    }

    #[test]
    fn with_policy_reclassifies_existing_votes() {
        let mut opinion = Opinion::new(Uuid::new_v4(), "hot take").unwrap();
        opinion.apply_vote(Uuid::new_v4(), VoteDirection::Down);
        assert!(!opinion.is_less_popular());

        let opinion = opinion.with_policy(PopularityPolicy::with_threshold(-1));
        assert!(opinion.is_less_popular());
    }

    #[test]
    fn from_vote_sets_reports_conflicts() {
        let shared = Uuid::new_v4();
        let (opinion, conflicts) = Opinion::from_vote_sets(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "legacy",
            0,
            [shared, Uuid::new_v4()],
            [shared],
        )
        .unwrap();

        assert_eq!(conflicts, vec![shared]);
        assert_eq!(opinion.vote_of(&shared), None);
        assert_eq!(opinion.score(), 1);
    }

    #[test]
    fn ballot_votes_and_reads_through() {
        let mut opinion = Opinion::new(Uuid::new_v4(), "ballot").unwrap();
        let voter = Uuid::new_v4();

        let mut ballot = OpinionBallot::new(&mut opinion);
        ballot.apply_vote(voter, VoteDirection::Down);
        assert_eq!(ballot.score(), -1);
        assert_eq!(ballot.content(), "ballot");
        assert_eq!(ballot.retract_vote(&voter), Some(VoteDirection::Down));

        assert_eq!(opinion.score(), 0);
        assert!(opinion.votes().is_empty());
    }
}
