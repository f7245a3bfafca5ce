use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Comment, CommentAuthor, CommentView};
use crate::error::{AppError, AppResult};

const COMMENT_COLUMNS: &str = "id, post_id, user_id, body, created_at, updated_at";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn find_for_pair(conn: &Connection, post_id: &str, user_id: &str) -> AppResult<Option<Comment>> {
    let comment = conn
        .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1 AND user_id = ?2"),
            params![post_id, user_id],
            comment_from_row,
        )
        .optional()?;
    Ok(comment)
}

/// Creates the single comment a user may hold on a post.
pub fn insert(conn: &Connection, post_id: &str, user_id: &str, body: &str) -> AppResult<Comment> {
    if find_for_pair(conn, post_id, user_id)?.is_some() {
        return Err(AppError::Conflict(
            "You already have a comment for this blog".into(),
        ));
    }

    let id = uuid::Uuid::now_v7().to_string();
    // The UNIQUE(post_id, user_id) index catches a racing insert the check missed
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, post_id, user_id, body],
    )
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            AppError::Conflict("You already have a comment for this blog".into())
        } else if super::is_foreign_key_violation(&e) {
            AppError::NotFound("No blog found with that ID".into())
        } else {
            e.into()
        }
    })?;

    find_for_pair(conn, post_id, user_id)?
        .ok_or_else(|| AppError::Internal("inserted comment vanished".into()))
}

pub fn update_for_pair(conn: &Connection, post_id: &str, user_id: &str, body: &str) -> AppResult<Comment> {
    let updated = conn.execute(
        "UPDATE comments SET body = ?3, updated_at = datetime('now') WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id, body],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("No comment found for this blog".into()));
    }

    find_for_pair(conn, post_id, user_id)?
        .ok_or_else(|| AppError::NotFound("No comment found for this blog".into()))
}

pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
    let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound("No comment found with that ID".into()));
    }
    Ok(())
}

/// Comments under a post, oldest first, with their authors populated.
pub fn list_for_post(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, u.id, u.name, u.email, c.body, c.created_at, c.updated_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(CommentView {
                id: row.get(0)?,
                post_id: row.get(1)?,
                user: CommentAuthor {
                    id: row.get(2)?,
                    name: row.get(3)?,
                    email: row.get(4)?,
                },
                body: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO users (id, name, email, password_hash, role) VALUES ('admin', 'ADMIN', 'admin@x.io', 'h', 'admin');
             INSERT INTO users (id, name, email, password_hash) VALUES ('u1', 'ALICE', 'alice@x.io', 'h');
             INSERT INTO posts (id, title, content, topic, author_id) VALUES ('p1', 'T', 'c', 'tech', 'admin');",
        )
        .unwrap();
    }

    #[test]
    fn second_comment_on_same_post_is_conflict() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        insert(&conn, "p1", "u1", "first").unwrap();
        let err = insert(&conn, "p1", "u1", "second").unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        let err = insert(&conn, "ghost", "u1", "hello").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn list_populates_author() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        seed(&conn);
        insert(&conn, "p1", "u1", "nice post").unwrap();

        let comments = list_for_post(&conn, "p1").unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].user.name, "ALICE");
        assert_eq!(comments[0].body, "nice post");
    }

    #[test]
    fn update_without_comment_is_not_found() {
        let (_tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        seed(&conn);

        let err = update_for_pair(&conn, "p1", "u1", "edit").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
