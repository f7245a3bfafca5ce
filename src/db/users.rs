//! Credential store: persisted accounts, password state and reset tokens.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{ImageRef, Role, User};
use crate::error::{AppError, AppResult};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, profile_pic, password_changed_at, \
     password_reset_token, password_reset_expires, created_at, updated_at";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub profile_pic: Option<&'a ImageRef>,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        profile_pic: row.get(5)?,
        password_changed_at: row.get(6)?,
        password_reset_token: row.get(7)?,
        password_reset_expires: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn insert(conn: &Connection, new: &NewUser<'_>) -> AppResult<User> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, profile_pic)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            new.name,
            new.email,
            new.password_hash,
            new.role,
            new.profile_pic
        ],
    )
    .map_err(|e| {
        if super::is_unique_violation(&e) {
            AppError::Conflict("Email already exists".into())
        } else {
            e.into()
        }
    })?;

    find_by_id(conn, &id)?.ok_or_else(|| AppError::Internal("inserted user vanished".into()))
}

pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Finds the account holding this reset-token hash, if it has not expired.
pub fn find_by_reset_token(conn: &Connection, token_hash: &str, now: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE password_reset_token = ?1 AND password_reset_expires > ?2"
            ),
            params![token_hash, now],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list(conn: &Connection) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Stores a new password hash and stamps the change; clears any pending reset.
pub fn set_password(conn: &Connection, id: &str, password_hash: &str, changed_at: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE users
         SET password_hash = ?2,
             password_changed_at = ?3,
             password_reset_token = NULL,
             password_reset_expires = NULL,
             updated_at = datetime('now')
         WHERE id = ?1",
        params![id, password_hash, changed_at],
    )?;
    Ok(())
}

pub fn set_reset_token(
    conn: &Connection,
    id: &str,
    token_hash: Option<&str>,
    expires_at: Option<i64>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET password_reset_token = ?2, password_reset_expires = ?3 WHERE id = ?1",
        params![id, token_hash, expires_at],
    )?;
    Ok(())
}

/// Replaces only the profile fields that are given.
pub fn update_profile(
    conn: &Connection,
    id: &str,
    name: Option<&str>,
    profile_pic: Option<&ImageRef>,
) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE users
         SET name = COALESCE(?2, name),
             profile_pic = COALESCE(?3, profile_pic),
             updated_at = datetime('now')
         WHERE id = ?1",
        params![id, name, profile_pic],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound("No user found with that ID".into()));
    }
    Ok(())
}

/// Deletes an account together with its comments and reactions.
///
/// Reaction counters on the affected posts are decremented in the same
/// transaction so they keep matching the surviving reactions. Accounts that
/// still author posts are refused.
pub fn delete(conn: &mut Connection, id: &str) -> AppResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("No user found with that ID".into()));
    }

    let authored: i64 = tx.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if authored > 0 {
        return Err(AppError::Conflict(format!(
            "User still authors {} blog(s); delete them first",
            authored
        )));
    }

    tx.execute(
        "UPDATE posts SET likes_count = likes_count - 1
         WHERE id IN (SELECT post_id FROM reactions WHERE user_id = ?1 AND kind = 'like')",
        params![id],
    )?;
    tx.execute(
        "UPDATE posts SET dislikes_count = dislikes_count - 1
         WHERE id IN (SELECT post_id FROM reactions WHERE user_id = ?1 AND kind = 'dislike')",
        params![id],
    )?;
    tx.execute("DELETE FROM reactions WHERE user_id = ?1", params![id])?;
    tx.execute("DELETE FROM comments WHERE user_id = ?1", params![id])?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;

    tx.commit()?;
    Ok(())
}
