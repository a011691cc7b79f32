//! Vote ledger and popularity classification.
//!
//! # Responsibility
//! - Hold the current vote direction of every identity for one opinion.
//! - Derive `score` and the less-popular flag from vote cardinalities.
//!
//! # Invariants
//! - An identity has at most one vote direction (single map entry).
//! - `up_count + down_count == entries.len()` after every mutation.
//! - `compute_derived` is pure and total over all finite cardinalities.
//!
//! # See also
//! - crate::model::opinion

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Score at or below which an opinion is classified as less popular.
pub const LESS_POPULAR_THRESHOLD: i64 = -500;

/// Direction of one identity's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Stable string id used by storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Parses the storage string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Result of applying one vote to a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Voter had no prior vote.
    Cast,
    /// Voter's prior vote in the opposite direction was replaced.
    Switched,
    /// Voter already voted this direction; nothing changed.
    Unchanged,
}

/// Policy deciding when a score demotes an opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularityPolicy {
    /// Inclusive upper bound: `score <= less_popular_threshold` is less popular.
    pub less_popular_threshold: i64,
}

impl Default for PopularityPolicy {
    fn default() -> Self {
        Self {
            less_popular_threshold: LESS_POPULAR_THRESHOLD,
        }
    }
}

impl PopularityPolicy {
    pub fn with_threshold(less_popular_threshold: i64) -> Self {
        Self {
            less_popular_threshold,
        }
    }

    pub fn is_less_popular(&self, score: i64) -> bool {
        score <= self.less_popular_threshold
    }

    /// Derives score and classification from vote cardinalities.
    pub fn classify(&self, upvote_count: usize, downvote_count: usize) -> DerivedVoteState {
        let score = signed_difference(upvote_count, downvote_count);
        DerivedVoteState {
            score,
            is_less_popular: self.is_less_popular(score),
        }
    }
}

/// Fields derived from a vote ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedVoteState {
    /// Upvote count minus downvote count.
    pub score: i64,
    /// Whether `score` is at or below the policy threshold.
    pub is_less_popular: bool,
}

/// Computes derived vote fields under the default policy.
pub fn compute_derived(upvote_count: usize, downvote_count: usize) -> DerivedVoteState {
    PopularityPolicy::default().classify(upvote_count, downvote_count)
}

fn signed_difference(up: usize, down: usize) -> i64 {
    let diff = i128::try_from(up).unwrap_or(i128::MAX) - i128::try_from(down).unwrap_or(i128::MAX);
    i64::try_from(diff).unwrap_or(if diff.is_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Per-opinion map from identity to its current vote direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteLedger {
    entries: BTreeMap<Uuid, VoteDirection>,
    up_count: usize,
    down_count: usize,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from two independent sets.
    ///
    /// Identities present in both sets are an internal consistency fault:
    /// they are dropped from both and returned so the caller can require a
    /// fresh vote.
    pub fn from_sets(
        upvoters: impl IntoIterator<Item = Uuid>,
        downvoters: impl IntoIterator<Item = Uuid>,
    ) -> (Self, Vec<Uuid>) {
        let up: BTreeSet<Uuid> = upvoters.into_iter().collect();
        let down: BTreeSet<Uuid> = downvoters.into_iter().collect();
        let conflicts: Vec<Uuid> = up.intersection(&down).copied().collect();

        let mut ledger = Self::new();
        for voter in up.difference(&down) {
            ledger.set(*voter, VoteDirection::Up);
        }
        for voter in down.difference(&up) {
            ledger.set(*voter, VoteDirection::Down);
        }
        (ledger, conflicts)
    }

    /// Records `direction` for `voter`, replacing any opposite vote.
    pub fn set(&mut self, voter: Uuid, direction: VoteDirection) -> VoteOutcome {
        match self.entries.insert(voter, direction) {
            None => {
                self.bump(direction, true);
                VoteOutcome::Cast
            }
            Some(previous) if previous == direction => VoteOutcome::Unchanged,
            Some(previous) => {
                self.bump(previous, false);
                self.bump(direction, true);
                VoteOutcome::Switched
            }
        }
    }

    /// Removes `voter`'s vote, returning the removed direction.
    pub fn remove(&mut self, voter: &Uuid) -> Option<VoteDirection> {
        let previous = self.entries.remove(voter)?;
        self.bump(previous, false);
        Some(previous)
    }

    pub fn direction_of(&self, voter: &Uuid) -> Option<VoteDirection> {
        self.entries.get(voter).copied()
    }

    pub fn upvote_count(&self) -> usize {
        self.up_count
    }

    pub fn downvote_count(&self) -> usize {
        self.down_count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities currently voting `direction`, in ascending id order.
    pub fn voters(&self, direction: VoteDirection) -> impl Iterator<Item = Uuid> + '_ {
        self.entries
            .iter()
            .filter(move |(_, value)| **value == direction)
            .map(|(voter, _)| *voter)
    }

    /// All `(identity, direction)` entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, VoteDirection)> + '_ {
        self.entries.iter().map(|(voter, direction)| (*voter, *direction))
    }

    fn bump(&mut self, direction: VoteDirection, increment: bool) {
        let counter = match direction {
            VoteDirection::Up => &mut self.up_count,
            VoteDirection::Down => &mut self.down_count,
        };
        if increment {
            *counter += 1;
        } else {
            *counter -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compute_derived, PopularityPolicy, VoteDirection, VoteLedger, VoteOutcome,
        LESS_POPULAR_THRESHOLD,
    };
    use uuid::Uuid;

    #[test]
    fn score_is_upvotes_minus_downvotes() {
        for (up, down) in [(0, 0), (10, 3), (3, 10), (0, 500), (1_000, 1)] {
            let derived = compute_derived(up, down);
            assert_eq!(derived.score, up as i64 - down as i64);
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(LESS_POPULAR_THRESHOLD, -500);
        assert!(!compute_derived(0, 499).is_less_popular);
        assert!(compute_derived(0, 500).is_less_popular);
        assert!(compute_derived(0, 501).is_less_popular);
        assert!(!compute_derived(0, 0).is_less_popular);
    }

    #[test]
    fn huge_cardinalities_saturate_instead_of_wrapping() {
        let derived = compute_derived(0, usize::MAX);
        assert_eq!(derived.score, i64::MIN);
        assert!(derived.is_less_popular);
        assert_eq!(compute_derived(usize::MAX, 0).score, i64::MAX);
    }

    #[test]
    fn custom_policy_moves_the_threshold() {
        let policy = PopularityPolicy::with_threshold(-2);
        assert!(!policy.classify(0, 1).is_less_popular);
        assert!(policy.classify(0, 2).is_less_popular);
    }

    #[test]
    fn set_tracks_cardinalities_across_switches() {
        let mut ledger = VoteLedger::new();
        let voter = Uuid::new_v4();

        assert_eq!(ledger.set(voter, VoteDirection::Up), VoteOutcome::Cast);
        assert_eq!(ledger.set(voter, VoteDirection::Up), VoteOutcome::Unchanged);
        assert_eq!((ledger.upvote_count(), ledger.downvote_count()), (1, 0));

        assert_eq!(ledger.set(voter, VoteDirection::Down), VoteOutcome::Switched);
        assert_eq!((ledger.upvote_count(), ledger.downvote_count()), (0, 1));

        assert_eq!(ledger.remove(&voter), Some(VoteDirection::Down));
        assert_eq!(ledger.remove(&voter), None);
        assert!(ledger.is_empty());
        assert_eq!((ledger.upvote_count(), ledger.downvote_count()), (0, 0));
    }

    #[test]
    fn from_sets_drops_identities_found_in_both() {
        let both = Uuid::new_v4();
        let up_only = Uuid::new_v4();
        let down_only = Uuid::new_v4();

        let (ledger, conflicts) =
            VoteLedger::from_sets([both, up_only, up_only], [both, down_only]);

        assert_eq!(conflicts, vec![both]);
        assert_eq!(ledger.direction_of(&both), None);
        assert_eq!(ledger.direction_of(&up_only), Some(VoteDirection::Up));
        assert_eq!(ledger.direction_of(&down_only), Some(VoteDirection::Down));
        assert_eq!((ledger.upvote_count(), ledger.downvote_count()), (1, 1));
    }

    #[test]
    fn direction_storage_strings_are_stable() {
        assert_eq!(VoteDirection::parse(VoteDirection::Up.as_str()), Some(VoteDirection::Up));
        assert_eq!(VoteDirection::parse("down"), Some(VoteDirection::Down));
        assert_eq!(VoteDirection::parse("sideways"), None);
    }
}
