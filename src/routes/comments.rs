use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminsOnly, ApiJson, Authorized, UsersOnly};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments/blog/{id}/comments", get(list_comments))
        .route(
            "/comments/blog/{id}/comment",
            axum::routing::post(create_comment).patch(update_comment),
        )
        .route("/comments/{id}", delete(delete_comment))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comment: String,
}

fn validate_comment(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("A comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "A comment must have at most {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(text.to_string())
}

// --- Handlers ---

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    if !db::posts::exists(&conn, &post_id)? {
        return Err(AppError::NotFound("No blog found with that ID".into()));
    }
    let comments = db::comments::list_for_post(&conn, &post_id)?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "results": comments.len(),
        "data": { "comments": comments },
    }))
    .into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> AppResult<Response> {
    let text = validate_comment(&req.comment)?;

    let conn = state.db.get()?;
    let comment = db::comments::insert(&conn, &post_id, &user.principal.id, &text)?;

    tracing::debug!(blog_id = %post_id, user_id = %user.principal.id, "Comment created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "Success",
            "data": { "comment": comment },
        })),
    )
        .into_response())
}

async fn update_comment(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> AppResult<Response> {
    let text = validate_comment(&req.comment)?;

    let conn = state.db.get()?;
    let comment = db::comments::update_for_pair(&conn, &post_id, &user.principal.id, &text)?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "data": { "comment": comment },
    }))
    .into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    admin: Authorized<AdminsOnly>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    db::comments::delete(&conn, &id)?;

    tracing::info!(comment_id = %id, by = %admin.principal.id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
