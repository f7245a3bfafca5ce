use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/register", post(handlers::register))
        .route("/users/admin/signup", post(handlers::admin_signup))
        .route("/users/login", post(handlers::login))
        .route("/users/logout", post(handlers::logout))
        .route("/users/forget-password", post(handlers::forget_password))
        .route("/users/resetpassword/{token}", patch(handlers::reset_password))
        .route("/users/updatepassword", patch(handlers::update_password))
        .route("/users/me", get(handlers::me))
        .route("/users/updateprofile", patch(handlers::update_profile))
        .route("/users/delete-user/{id}", delete(handlers::delete_user))
}
