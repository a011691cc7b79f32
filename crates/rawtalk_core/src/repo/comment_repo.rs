//! Comment repository contracts and SQLite implementation.

use crate::db::migrations::ensure_migrated;
use crate::model::comment::{Comment, CommentId};
use crate::model::opinion::OpinionId;
use crate::repo::{
    constraint_kind, parse_uuid_column, push_pagination, ConstraintKind, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const COMMENT_SELECT_SQL: &str = "SELECT
    uuid,
    opinion_uuid,
    author_uuid,
    content,
    created_at
FROM comments";

/// Repository interface for opinion comments.
pub trait CommentRepository {
    fn create_comment(&self, comment: &Comment) -> RepoResult<CommentId>;
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>>;
    /// Lists comments of one opinion oldest first (`created_at ASC, uuid ASC`).
    fn list_comments(
        &self,
        opinion: OpinionId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<Comment>>;
    fn delete_comment(&self, id: CommentId) -> RepoResult<()>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    /// Wraps a connection after checking that migrations were applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn create_comment(&self, comment: &Comment) -> RepoResult<CommentId> {
        comment.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO comments (uuid, opinion_uuid, author_uuid, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                comment.uuid.to_string(),
                comment.opinion.to_string(),
                comment.author.to_string(),
                comment.content.as_str(),
                comment.created_at,
            ],
        );

        match inserted {
            Ok(_) => Ok(comment.uuid),
            Err(err) => Err(match constraint_kind(&err) {
                Some(ConstraintKind::ForeignKey) => RepoError::MissingReference(format!(
                    "comment references unknown opinion {} or author {}",
                    comment.opinion, comment.author
                )),
                Some(ConstraintKind::Unique) => {
                    RepoError::Conflict(format!("comment {} already exists", comment.uuid))
                }
                None => err.into(),
            }),
        }
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>> {
        self.conn
            .query_row(
                &format!("{COMMENT_SELECT_SQL} WHERE uuid = ?1;"),
                [id.to_string()],
                |row| Ok(parse_comment_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_comments(
        &self,
        opinion: OpinionId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<Comment>> {
        let mut sql = format!(
            "{COMMENT_SELECT_SQL} WHERE opinion_uuid = ? ORDER BY created_at ASC, uuid ASC"
        );
        let mut bind_values = vec![Value::Text(opinion.to_string())];
        push_pagination(&mut sql, &mut bind_values, limit, offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }

        Ok(comments)
    }

    fn delete_comment(&self, id: CommentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM comments WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "comment",
                id,
            });
        }

        Ok(())
    }
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let comment = Comment {
        uuid: parse_uuid_column(row, "uuid", "comments")?,
        opinion: parse_uuid_column(row, "opinion_uuid", "comments")?,
        author: parse_uuid_column(row, "author_uuid", "comments")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
    };
    comment
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("comments row {}: {err}", comment.uuid)))?;
    Ok(comment)
}
