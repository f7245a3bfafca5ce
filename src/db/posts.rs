use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{AuthorSummary, ImageRef, Post, Topic};
use crate::error::{AppError, AppResult};

const POST_COLUMNS: &str = "id, title, content, topic, author_id, thumbnail, likes_count, \
     dislikes_count, created_at, updated_at";

pub struct NewPost<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub topic: Topic,
    pub author_id: &'a str,
    pub thumbnail: Option<&'a ImageRef>,
}

/// Fields an update may replace; `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub topic: Option<Topic>,
    pub thumbnail: Option<ImageRef>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        topic: row.get(3)?,
        author_id: row.get(4)?,
        thumbnail: row.get(5)?,
        likes_count: row.get(6)?,
        dislikes_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn title_conflict(e: rusqlite::Error) -> AppError {
    if super::is_unique_violation(&e) {
        AppError::Conflict("A blog with that title already exists".into())
    } else {
        e.into()
    }
}

pub fn insert(conn: &Connection, new: &NewPost<'_>) -> AppResult<Post> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, title, content, topic, author_id, thumbnail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.title,
            new.content,
            new.topic,
            new.author_id,
            new.thumbnail
        ],
    )
    .map_err(title_conflict)?;

    find_by_id(conn, &id)?.ok_or_else(|| AppError::Internal("inserted blog vanished".into()))
}

pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id],
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

pub fn exists(conn: &Connection, id: &str) -> AppResult<bool> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn title_taken(conn: &Connection, title: &str) -> AppResult<bool> {
    let taken = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Newest first, optionally restricted to one topic.
pub fn list(conn: &Connection, topic: Option<Topic>) -> AppResult<Vec<Post>> {
    let posts = match topic {
        Some(topic) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE topic = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![topic], post_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], post_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(posts)
}

pub fn author_of(conn: &Connection, post: &Post) -> AppResult<Option<AuthorSummary>> {
    let author = conn
        .query_row(
            "SELECT id, name, email, role FROM users WHERE id = ?1",
            params![post.author_id],
            |row| {
                Ok(AuthorSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(author)
}

/// Applies a partial update in one statement, so concurrent updates to other
/// fields are never reverted. Author and counters are never touched here.
pub fn update(conn: &Connection, id: &str, changes: PostChanges) -> AppResult<Post> {
    let updated = conn
        .execute(
            "UPDATE posts
             SET title = COALESCE(?2, title),
                 content = COALESCE(?3, content),
                 topic = COALESCE(?4, topic),
                 thumbnail = COALESCE(?5, thumbnail),
                 updated_at = datetime('now')
             WHERE id = ?1",
            params![
                id,
                changes.title,
                changes.content,
                changes.topic,
                changes.thumbnail
            ],
        )
        .map_err(title_conflict)?;
    if updated == 0 {
        return Err(AppError::NotFound("No blog found with that ID".into()));
    }

    find_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("No blog found with that ID".into()))
}

/// Deletes a post; its comments and reactions go with it (ON DELETE CASCADE).
pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
    let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound("No blog found with that ID".into()));
    }
    Ok(())
}
