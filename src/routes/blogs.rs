use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db;
use crate::db::models::{ImageRef, Post, Topic};
use crate::db::posts::{NewPost, PostChanges};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminsOnly, ApiJson, Authorized};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs).post(create_blog))
        .route("/blogs/{id}", get(get_blog))
        .route("/blogs/topic/{topic}", get(list_by_topic))
        .route("/blogs/updateblog/{id}", patch(update_blog))
        .route("/blogs/deleteblog/{id}", delete(delete_blog))
}

// --- Request types ---

#[derive(Deserialize)]
pub struct CreateBlogRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub topic: String,
    pub thumbnail: Option<ImageRef>,
}

#[derive(Deserialize)]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub topic: Option<String>,
    pub thumbnail: Option<ImageRef>,
}

// --- Validation ---

fn normalize_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("A blog must have a title".into()));
    }
    Ok(title.to_uppercase())
}

fn require_content(content: &str) -> AppResult<String> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("A blog must have content".into()));
    }
    Ok(content.to_string())
}

fn parse_topic(topic: &str) -> AppResult<Topic> {
    topic.trim().to_lowercase().parse().map_err(|_| {
        let allowed: Vec<&str> = Topic::ALL.iter().map(Topic::as_str).collect();
        AppError::BadRequest(format!("Topic must be one of: {}", allowed.join(", ")))
    })
}

fn list_response(posts: Vec<Post>) -> Response {
    Json(serde_json::json!({
        "status": "Success",
        "results": posts.len(),
        "data": { "blogs": posts },
    }))
    .into_response()
}

// --- Handlers ---

async fn list_blogs(State(state): State<AppState>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = db::posts::list(&conn, None)?;
    Ok(list_response(posts))
}

async fn list_by_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> AppResult<Response> {
    let topic = parse_topic(&topic)?;
    let conn = state.db.get()?;
    let posts = db::posts::list(&conn, Some(topic))?;
    Ok(list_response(posts))
}

/// The author is populated as `{_id, name, email, role}`.
async fn get_blog(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = db::posts::find_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("No blog found with that ID".into()))?;
    let author = db::posts::author_of(&conn, &post)?;

    let mut blog = serde_json::to_value(&post)?;
    if let Some(author) = author {
        blog["author"] = serde_json::to_value(author)?;
    }

    Ok(Json(serde_json::json!({
        "status": "Success",
        "data": { "blog": blog },
    }))
    .into_response())
}

async fn create_blog(
    State(state): State<AppState>,
    admin: Authorized<AdminsOnly>,
    ApiJson(req): ApiJson<CreateBlogRequest>,
) -> AppResult<Response> {
    let title = normalize_title(&req.title)?;
    let content = require_content(&req.content)?;
    if req.topic.trim().is_empty() {
        return Err(AppError::BadRequest("A blog must have a topic".into()));
    }
    let topic = parse_topic(&req.topic)?;

    let conn = state.db.get()?;
    if db::posts::title_taken(&conn, &title)? {
        return Err(AppError::Conflict(
            "A blog with that title already exists".into(),
        ));
    }

    let post = db::posts::insert(
        &conn,
        &NewPost {
            title: &title,
            content: &content,
            topic,
            author_id: &admin.principal.id,
            thumbnail: req.thumbnail.as_ref(),
        },
    )?;

    tracing::info!(blog_id = %post.id, author = %admin.principal.id, "Blog created");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "Success",
            "data": { "blog": post },
        })),
    )
        .into_response())
}

async fn update_blog(
    State(state): State<AppState>,
    _admin: Authorized<AdminsOnly>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateBlogRequest>,
) -> AppResult<Response> {
    let changes = PostChanges {
        title: req.title.as_deref().map(normalize_title).transpose()?,
        content: req.content.as_deref().map(require_content).transpose()?,
        topic: req.topic.as_deref().map(parse_topic).transpose()?,
        thumbnail: req.thumbnail,
    };

    let conn = state.db.get()?;
    let post = db::posts::update(&conn, &id, changes)?;

    tracing::info!(blog_id = %post.id, "Blog updated");
    Ok(Json(serde_json::json!({
        "status": "Success",
        "data": { "blog": post },
    }))
    .into_response())
}

async fn delete_blog(
    State(state): State<AppState>,
    admin: Authorized<AdminsOnly>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    db::posts::delete(&conn, &id)?;

    tracing::info!(blog_id = %id, by = %admin.principal.id, "Blog deleted");
    Ok(StatusCode::NO_CONTENT)
}
