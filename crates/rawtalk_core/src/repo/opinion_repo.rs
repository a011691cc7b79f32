//! Opinion repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist opinions together with their vote ledger and derived fields.
//! - Provide the atomic read-modify-write cycle used by vote operations.
//!
//! # Invariants
//! - `update_votes` holds an immediate (write-locked) transaction from the
//!   ledger read until the derived fields are written.
//! - `opinion_votes` has one row per `(opinion, voter)`, so a voter's
//!   direction is exclusive in storage as well as in memory.
//! - Stored `score`/`is_less_popular` are never trusted on read; they are
//!   recomputed from the ledger and drift is logged. The feed filter scores
//!   rows from `opinion_votes`, not from the stored column.
//! - The `update_votes` closure only sees an [`OpinionBallot`], so the
//!   cycle cannot change anything it does not write back.

use crate::db::migrations::ensure_migrated;
use crate::model::opinion::{normalize_opinion_content, Opinion, OpinionBallot, OpinionId};
use crate::model::user::UserId;
use crate::model::vote::{PopularityPolicy, VoteDirection, VoteLedger};
use crate::repo::{
    bool_to_int, constraint_kind, int_to_bool, parse_uuid_column, push_pagination,
    ConstraintKind, RepoError, RepoResult,
};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::HashMap;

const OPINION_SELECT_SQL: &str = "SELECT
    uuid,
    author_uuid,
    content,
    score,
    is_less_popular,
    created_at
FROM opinions";

/// Score of the enclosing `opinions` row computed from its vote rows.
const LIVE_SCORE_SQL: &str = "(SELECT COALESCE(SUM(CASE v.direction WHEN 'up' THEN 1 WHEN 'down' THEN -1 ELSE 0 END), 0)
    FROM opinion_votes v
    WHERE v.opinion_uuid = opinions.uuid)";

/// Opinion ids bound per ledger query, below SQLite's variable limit.
const LEDGER_BATCH_SIZE: usize = 500;

/// Query options for listing opinions.
#[derive(Debug, Clone, Default)]
pub struct OpinionListQuery {
    /// Restrict to one author.
    pub author: Option<UserId>,
    /// Include opinions classified as less popular (hidden by default).
    pub include_less_popular: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for opinions and their votes.
pub trait OpinionRepository {
    fn create_opinion(&self, opinion: &Opinion) -> RepoResult<OpinionId>;
    fn get_opinion(&self, id: OpinionId) -> RepoResult<Option<Opinion>>;
    /// Lists opinions newest first (`created_at DESC, uuid ASC`).
    fn list_opinions(&self, query: &OpinionListQuery) -> RepoResult<Vec<Opinion>>;
    fn update_content(&self, id: OpinionId, content: &str) -> RepoResult<()>;
    /// Loads one opinion, applies `mutate`, and persists the resulting
    /// ledger and derived fields atomically.
    ///
    /// Returns the persisted opinion and the value returned by `mutate`.
    /// `mutate` can only cast or retract votes; use `update_content` for
    /// text edits.
    fn update_votes<T, F>(&self, id: OpinionId, mutate: F) -> RepoResult<(Opinion, T)>
    where
        F: FnOnce(&mut OpinionBallot<'_>) -> T;
    /// Hard-deletes an opinion with its votes and comments.
    fn delete_opinion(&self, id: OpinionId) -> RepoResult<()>;
}

/// SQLite-backed opinion repository.
pub struct SqliteOpinionRepository<'conn> {
    conn: &'conn Connection,
    policy: PopularityPolicy,
}

impl<'conn> SqliteOpinionRepository<'conn> {
    /// Wraps a connection after checking that migrations were applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self {
            conn,
            policy: PopularityPolicy::default(),
        })
    }

    /// Classifies loaded opinions with `policy` instead of the default.
    pub fn with_policy(mut self, policy: PopularityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PopularityPolicy {
        self.policy
    }
}

impl OpinionRepository for SqliteOpinionRepository<'_> {
    fn create_opinion(&self, opinion: &Opinion) -> RepoResult<OpinionId> {
        let opinion = opinion.clone().with_policy(self.policy);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT INTO opinions (
                uuid,
                author_uuid,
                content,
                score,
                is_less_popular,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
            params![
                opinion.uuid().to_string(),
                opinion.author().to_string(),
                opinion.content(),
                opinion.score(),
                bool_to_int(opinion.is_less_popular()),
                opinion.created_at(),
            ],
        );
        if let Err(err) = inserted {
            return Err(match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => RepoError::MissingReference(format!(
                    "opinion author {} is not a registered user",
                    opinion.author()
                )),
                Some(ConstraintKind::Unique) => {
                    RepoError::Conflict(format!("opinion {} already exists", opinion.uuid()))
                }
                None => err.into(),
            });
        }

        write_vote_diff(&tx, opinion.uuid(), &VoteLedger::new(), opinion.votes())?;
        tx.commit()?;
        Ok(opinion.uuid())
    }

    fn get_opinion(&self, id: OpinionId) -> RepoResult<Option<Opinion>> {
        load_opinion(self.conn, id, self.policy)
    }

    fn list_opinions(&self, query: &OpinionListQuery) -> RepoResult<Vec<Opinion>> {
        let mut sql = format!("{OPINION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(author) = query.author {
            sql.push_str(" AND author_uuid = ?");
            bind_values.push(Value::Text(author.to_string()));
        }

        if !query.include_less_popular {
            sql.push_str(&format!(" AND {LIVE_SCORE_SQL} > ?"));
            bind_values.push(Value::Integer(self.policy.less_popular_threshold));
        }

        sql.push_str(" ORDER BY created_at DESC, uuid ASC");
        push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut heads = Vec::new();
        while let Some(row) = rows.next()? {
            heads.push(parse_opinion_row(row)?);
        }

        let ids: Vec<OpinionId> = heads.iter().map(|head| head.uuid).collect();
        let mut ledgers = load_ledgers(self.conn, &ids)?;
        heads
            .into_iter()
            .map(|head| {
                let votes = ledgers.remove(&head.uuid).unwrap_or_default();
                head.into_opinion(votes, self.policy)
            })
            .collect()
    }

    fn update_content(&self, id: OpinionId, content: &str) -> RepoResult<()> {
        let content = normalize_opinion_content(content)?;

        let changed = self.conn.execute(
            "UPDATE opinions
             SET
                content = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![content, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "opinion",
                id,
            });
        }

        Ok(())
    }

    fn update_votes<T, F>(&self, id: OpinionId, mutate: F) -> RepoResult<(Opinion, T)>
    where
        F: FnOnce(&mut OpinionBallot<'_>) -> T,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut opinion = load_opinion(&tx, id, self.policy)?.ok_or(RepoError::NotFound {
            entity: "opinion",
            id,
        })?;
        let before = opinion.votes().clone();
        let value = mutate(&mut OpinionBallot::new(&mut opinion));

        write_vote_diff(&tx, id, &before, opinion.votes())?;
        tx.execute(
            "UPDATE opinions
             SET
                score = ?1,
                is_less_popular = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?3;",
            params![
                opinion.score(),
                bool_to_int(opinion.is_less_popular()),
                id.to_string()
            ],
        )?;
        tx.commit()?;

        Ok((opinion, value))
    }

    fn delete_opinion(&self, id: OpinionId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM opinions WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "opinion",
                id,
            });
        }

        Ok(())
    }
}

/// Opinion row before its ledger is attached.
struct OpinionHead {
    uuid: OpinionId,
    author: UserId,
    content: String,
    stored_score: i64,
    stored_less_popular: bool,
    created_at: i64,
}

impl OpinionHead {
    fn into_opinion(self, votes: VoteLedger, policy: PopularityPolicy) -> RepoResult<Opinion> {
        let opinion = Opinion::from_parts(
            self.uuid,
            self.author,
            &self.content,
            self.created_at,
            votes,
            policy,
        )
        .map_err(|err| RepoError::InvalidData(format!("opinions row {}: {err}", self.uuid)))?;

        if opinion.score() != self.stored_score
            || opinion.is_less_popular() != self.stored_less_popular
        {
            warn!(
                "event=derived_drift_repaired module=opinion_repo status=repaired opinion={} stored_score={} score={}",
                self.uuid,
                self.stored_score,
                opinion.score()
            );
        }
        Ok(opinion)
    }
}

fn load_opinion(
    conn: &Connection,
    id: OpinionId,
    policy: PopularityPolicy,
) -> RepoResult<Option<Opinion>> {
    let head = conn
        .query_row(
            &format!("{OPINION_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
            |row| Ok(parse_opinion_row(row)),
        )
        .optional()?
        .transpose()?;

    let Some(head) = head else {
        return Ok(None);
    };
    let votes = load_ledgers(conn, &[id])?.remove(&id).unwrap_or_default();
    head.into_opinion(votes, policy).map(Some)
}

fn parse_opinion_row(row: &Row<'_>) -> RepoResult<OpinionHead> {
    Ok(OpinionHead {
        uuid: parse_uuid_column(row, "uuid", "opinions")?,
        author: parse_uuid_column(row, "author_uuid", "opinions")?,
        content: row.get("content")?,
        stored_score: row.get("score")?,
        stored_less_popular: int_to_bool(
            row.get("is_less_popular")?,
            "opinions.is_less_popular",
        )?,
        created_at: row.get("created_at")?,
    })
}

/// Loads the vote ledgers of `ids`. Opinions without votes are absent.
fn load_ledgers(
    conn: &Connection,
    ids: &[OpinionId],
) -> RepoResult<HashMap<OpinionId, VoteLedger>> {
    let mut ledgers: HashMap<OpinionId, VoteLedger> = HashMap::new();

    for batch in ids.chunks(LEDGER_BATCH_SIZE) {
        let placeholders = vec!["?"; batch.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT opinion_uuid, voter_uuid, direction
             FROM opinion_votes
             WHERE opinion_uuid IN ({placeholders});"
        ))?;
        let mut rows = stmt.query(params_from_iter(batch.iter().map(|id| id.to_string())))?;

        while let Some(row) = rows.next()? {
            let opinion = parse_uuid_column(row, "opinion_uuid", "opinion_votes")?;
            let voter = parse_uuid_column(row, "voter_uuid", "opinion_votes")?;
            let direction_text: String = row.get("direction")?;
            let direction = VoteDirection::parse(&direction_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid vote direction `{direction_text}` in opinion_votes.direction"
                ))
            })?;
            ledgers.entry(opinion).or_default().set(voter, direction);
        }
    }

    Ok(ledgers)
}

/// Writes only the ledger entries that differ between `before` and `after`.
fn write_vote_diff(
    conn: &Connection,
    id: OpinionId,
    before: &VoteLedger,
    after: &VoteLedger,
) -> RepoResult<()> {
    let opinion_uuid = id.to_string();

    for (voter, _) in before.iter() {
        if after.direction_of(&voter).is_none() {
            conn.execute(
                "DELETE FROM opinion_votes WHERE opinion_uuid = ?1 AND voter_uuid = ?2;",
                params![opinion_uuid, voter.to_string()],
            )?;
        }
    }

    for (voter, direction) in after.iter() {
        if before.direction_of(&voter) == Some(direction) {
            continue;
        }
        let upserted = conn.execute(
            "INSERT INTO opinion_votes (opinion_uuid, voter_uuid, direction)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (opinion_uuid, voter_uuid) DO UPDATE SET direction = excluded.direction;",
            params![opinion_uuid, voter.to_string(), direction.as_str()],
        );
        if let Err(err) = upserted {
            if constraint_kind(&err) == Some(ConstraintKind::ForeignKey) {
                return Err(RepoError::MissingReference(format!(
                    "voter {voter} is not a registered user"
                )));
            }
            return Err(err.into());
        }
    }

    Ok(())
}
