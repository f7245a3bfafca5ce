use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::db::models::ReactionKind;
use crate::error::AppResult;
use crate::extractors::{Authorized, UsersOnly};
use crate::reactions::{Outcome, ReactionAction, ReactionCounts};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reactions/blog/{id}", get(my_reaction))
        .route("/reactions/blog/{id}/like", post(like))
        .route("/reactions/blog/{id}/dislike", post(dislike))
        .route("/reactions/blog/{id}/reaction", delete(remove))
}

fn reaction_body(reaction: Option<ReactionKind>, counts: ReactionCounts) -> serde_json::Value {
    serde_json::json!({
        "reaction": reaction,
        "likesCount": counts.likes_count,
        "dislikesCount": counts.dislikes_count,
    })
}

async fn react(
    state: &AppState,
    post_id: &str,
    user_id: &str,
    action: ReactionAction,
) -> AppResult<Response> {
    let applied = state.reactions.apply(post_id, user_id, action).await?;
    let transition = applied.transition;

    let status = match transition.outcome {
        Outcome::Created(_) => StatusCode::CREATED,
        Outcome::Removed(_) | Outcome::Switched { .. } => StatusCode::OK,
    };

    Ok((
        status,
        Json(serde_json::json!({
            "status": "Success",
            "message": transition.message(action),
            "data": reaction_body(transition.next, applied.counts),
        })),
    )
        .into_response())
}

/// POST /api/v1/reactions/blog/{id}/like
async fn like(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    react(&state, &post_id, &user.principal.id, ReactionAction::Like).await
}

/// POST /api/v1/reactions/blog/{id}/dislike
async fn dislike(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    react(&state, &post_id, &user.principal.id, ReactionAction::Dislike).await
}

/// DELETE /api/v1/reactions/blog/{id}/reaction
async fn remove(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    react(&state, &post_id, &user.principal.id, ReactionAction::Remove).await
}

/// GET /api/v1/reactions/blog/{id}: the caller's reaction and the post's counters
async fn my_reaction(
    State(state): State<AppState>,
    user: Authorized<UsersOnly>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let counts = state.reactions.counts(&post_id).await?;
    let reaction = state.reactions.current(&post_id, &user.principal.id).await?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "data": reaction_body(reaction, counts),
    }))
    .into_response())
}
