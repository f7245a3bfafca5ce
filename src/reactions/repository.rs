// Repository pattern - isolates the reaction/counter writes
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use thiserror::Error;

use crate::db::models::ReactionKind;
use crate::error::AppError;
use crate::reactions::domain::{
    transition, ReactionAction, ReactionCounts, Transition, TransitionError,
};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Blog not found: {0}")]
    PostNotFound(String),

    #[error("No reaction found")]
    NoReaction,

    #[error("Counter invariant violated on blog {0}")]
    Inconsistent(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::PostNotFound(_) => {
                AppError::NotFound("No blog found with that ID".into())
            }
            RepositoryError::NoReaction => AppError::NotFound("No reaction found".into()),
            RepositoryError::Inconsistent(id) => {
                AppError::Internal(format!("reaction counters out of range on blog {}", id))
            }
        }
    }
}

/// A committed reaction change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedReaction {
    pub transition: Transition,
    pub counts: ReactionCounts,
}

/// Reaction storage. `apply` must be atomic per (post, user) pair together
/// with the post's counters.
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn apply(
        &self,
        post_id: &str,
        user_id: &str,
        action: ReactionAction,
    ) -> Result<AppliedReaction, RepositoryError>;

    async fn current(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Option<ReactionKind>, RepositoryError>;

    async fn counts(&self, post_id: &str) -> Result<ReactionCounts, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteReactionRepository {
    pool: DbPool,
}

impl SqliteReactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn read_counts(conn: &rusqlite::Connection, post_id: &str) -> Result<Option<ReactionCounts>, rusqlite::Error> {
    conn.query_row(
        "SELECT likes_count, dislikes_count FROM posts WHERE id = ?1",
        params![post_id],
        |row| {
            Ok(ReactionCounts {
                likes_count: row.get(0)?,
                dislikes_count: row.get(1)?,
            })
        },
    )
    .optional()
}

#[async_trait]
impl ReactionRepository for SqliteReactionRepository {
    async fn apply(
        &self,
        post_id: &str,
        user_id: &str,
        action: ReactionAction,
    ) -> Result<AppliedReaction, RepositoryError> {
        let mut conn = self.pool.get()?;

        // IMMEDIATE takes the write lock up front, so the read below cannot go
        // stale before the writes land. Dropping `tx` on any error rolls back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let before = read_counts(&tx, post_id)?
            .ok_or_else(|| RepositoryError::PostNotFound(post_id.to_string()))?;

        let current: Option<ReactionKind> = tx
            .query_row(
                "SELECT kind FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        let transition = transition(current, action).map_err(|e| match e {
            TransitionError::NothingToRemove => RepositoryError::NoReaction,
        })?;

        let expected = before.apply(&transition);
        if !expected.is_valid() {
            return Err(RepositoryError::Inconsistent(post_id.to_string()));
        }

        match (current, transition.next) {
            (None, Some(kind)) => {
                tx.execute(
                    "INSERT INTO reactions (id, post_id, user_id, kind) VALUES (?1, ?2, ?3, ?4)",
                    params![uuid::Uuid::now_v7().to_string(), post_id, user_id, kind],
                )?;
            }
            (Some(_), Some(kind)) => {
                tx.execute(
                    "UPDATE reactions SET kind = ?3, updated_at = datetime('now')
                     WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id, kind],
                )?;
            }
            (Some(_), None) => {
                tx.execute(
                    "DELETE FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id],
                )?;
            }
            (None, None) => return Err(RepositoryError::NoReaction),
        }

        tx.execute(
            "UPDATE posts
             SET likes_count = likes_count + ?2, dislikes_count = dislikes_count + ?3
             WHERE id = ?1",
            params![post_id, transition.likes_delta, transition.dislikes_delta],
        )?;

        let counts = read_counts(&tx, post_id)?
            .ok_or_else(|| RepositoryError::PostNotFound(post_id.to_string()))?;

        tx.commit()?;

        tracing::debug!(
            post_id,
            user_id,
            action = action.as_str(),
            likes = counts.likes_count,
            dislikes = counts.dislikes_count,
            "Reaction applied"
        );

        Ok(AppliedReaction { transition, counts })
    }

    async fn current(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Option<ReactionKind>, RepositoryError> {
        let conn = self.pool.get()?;
        let kind = conn
            .query_row(
                "SELECT kind FROM reactions WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind)
    }

    async fn counts(&self, post_id: &str) -> Result<ReactionCounts, RepositoryError> {
        let conn = self.pool.get()?;
        read_counts(&conn, post_id)?.ok_or_else(|| RepositoryError::PostNotFound(post_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    fn seed(pool: &DbPool) {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, name, email, password_hash, role) VALUES ('admin', 'ADMIN', 'admin@x.io', 'h', 'admin');
             INSERT INTO users (id, name, email, password_hash) VALUES ('a', 'A', 'a@x.io', 'h');
             INSERT INTO users (id, name, email, password_hash) VALUES ('b', 'B', 'b@x.io', 'h');
             INSERT INTO posts (id, title, content, topic, author_id) VALUES ('p', 'T', 'c', 'tech', 'admin');",
        )
        .unwrap();
    }

    fn reaction_rows(pool: &DbPool, kind: &str) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM reactions WHERE post_id = 'p' AND kind = ?1",
            params![kind],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn like_dislike_remove_scenario() {
        let (_tmp, pool) = migrated_pool();
        seed(&pool);
        let repo = SqliteReactionRepository::new(pool.clone());

        let liked = repo.apply("p", "a", ReactionAction::Like).await.unwrap();
        assert_eq!(liked.counts, ReactionCounts { likes_count: 1, dislikes_count: 0 });

        let switched = repo.apply("p", "a", ReactionAction::Dislike).await.unwrap();
        assert_eq!(switched.counts, ReactionCounts { likes_count: 0, dislikes_count: 1 });
        assert_eq!(reaction_rows(&pool, "dislike"), 1);
        assert_eq!(reaction_rows(&pool, "like"), 0);

        let removed = repo.apply("p", "a", ReactionAction::Remove).await.unwrap();
        assert_eq!(removed.counts, ReactionCounts::default());
        assert_eq!(repo.current("p", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reactions_from_distinct_users_accumulate() {
        let (_tmp, pool) = migrated_pool();
        seed(&pool);
        let repo = SqliteReactionRepository::new(pool.clone());

        repo.apply("p", "a", ReactionAction::Like).await.unwrap();
        let applied = repo.apply("p", "b", ReactionAction::Dislike).await.unwrap();
        assert_eq!(applied.counts, ReactionCounts { likes_count: 1, dislikes_count: 1 });
        assert_eq!(repo.current("p", "b").await.unwrap(), Some(ReactionKind::Dislike));
    }

    #[tokio::test]
    async fn missing_post_is_reported_and_nothing_written() {
        let (_tmp, pool) = migrated_pool();
        seed(&pool);
        let repo = SqliteReactionRepository::new(pool.clone());

        let err = repo.apply("ghost", "a", ReactionAction::Like).await.unwrap_err();
        assert!(matches!(err, RepositoryError::PostNotFound(_)));

        let conn = pool.get().unwrap();
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM reactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn removing_absent_reaction_is_no_reaction() {
        let (_tmp, pool) = migrated_pool();
        seed(&pool);
        let repo = SqliteReactionRepository::new(pool);

        let err = repo.apply("p", "a", ReactionAction::Remove).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NoReaction));
    }

    #[tokio::test]
    async fn desynchronised_counter_rolls_back_instead_of_going_negative() {
        let (_tmp, pool) = migrated_pool();
        seed(&pool);
        let repo = SqliteReactionRepository::new(pool.clone());

        repo.apply("p", "a", ReactionAction::Like).await.unwrap();
        // Simulate drift left behind by an older writer
        pool.get()
            .unwrap()
            .execute("UPDATE posts SET likes_count = 0 WHERE id = 'p'", [])
            .unwrap();

        let err = repo.apply("p", "a", ReactionAction::Like).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Inconsistent(_)));
        assert_eq!(repo.current("p", "a").await.unwrap(), Some(ReactionKind::Like));
        assert_eq!(repo.counts("p").await.unwrap().likes_count, 0);
    }
}
