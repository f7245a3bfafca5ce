use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::auth::password::{self, ResetToken};
use crate::auth::session;
use crate::db;
use crate::db::models::{ImageRef, Role, User};
use crate::db::users::NewUser;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminsOnly, ApiJson, Authorized, Principal};
use crate::mail;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub profile_pic: Option<ImageRef>,
    pub secret_key: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgetPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default, alias = "newPassword")]
    pub newpassword: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub profile_pic: Option<ImageRef>,
}

// -- Helpers --

fn normalize_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("A user must have a name".into()));
    }
    Ok(name.to_uppercase())
}

/// `{status, token, <key>: {user}}` with the credential cookie set.
fn credential_response(state: &AppState, user: &User, key: &str) -> AppResult<Response> {
    let (token, headers) = session::issue_credential(state, &user.id)?;
    let mut body = serde_json::json!({
        "status": "Success",
        "token": token,
    });
    body[key] = serde_json::json!({ "user": user });
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

fn create_account(state: &AppState, req: &SignupRequest, role: Role) -> AppResult<User> {
    let name = normalize_name(&req.name)?;
    let email = password::normalize_email(&req.email)?;
    password::validate_password(&req.password)?;

    let conn = state.db.get()?;
    if db::users::find_by_email(&conn, &email)?.is_some() {
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let password_hash = password::hash_password(&req.password, state.config.auth.bcrypt_cost)?;
    let user = db::users::insert(
        &conn,
        &NewUser {
            name: &name,
            email: &email,
            password_hash: &password_hash,
            role,
            profile_pic: req.profile_pic.as_ref(),
        },
    )?;

    tracing::info!(user_id = %user.id, role = %role, "Account created");
    Ok(user)
}

// -- Signup / login --

/// POST /api/v1/users/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> AppResult<Response> {
    let user = create_account(&state, &req, Role::User)?;
    credential_response(&state, &user, "body")
}

/// POST /api/v1/users/admin/signup: gated by the configured admin secret
pub async fn admin_signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> AppResult<Response> {
    let provided = req
        .secret_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please provide the admin secret key".into()))?;

    let expected = &state.config.auth.admin_secret_key;
    if expected.is_empty() {
        return Err(AppError::Forbidden("Admin signup is disabled".into()));
    }
    if provided != expected.as_str() {
        tracing::warn!("Admin signup attempted with an invalid secret key");
        return Err(AppError::Forbidden("Invalid admin secret key".into()));
    }

    let user = create_account(&state, &req, Role::Admin)?;
    credential_response(&state, &user, "body")
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide both email and password".into(),
        ));
    }

    let user = {
        let conn = state.db.get()?;
        db::users::find_by_email(&conn, &email)?
    };

    let user = match user {
        Some(user) if password::verify_password(&req.password, &user.password_hash) => user,
        _ => return Err(AppError::BadRequest("Wrong email or password".into())),
    };

    tracing::info!(user_id = %user.id, "User logged in");
    credential_response(&state, &user, "body")
}

/// POST /api/v1/users/logout
pub async fn logout(State(state): State<AppState>, _principal: Principal) -> AppResult<Response> {
    let body = serde_json::json!({
        "status": "Success",
        "message": "Logged out successfully",
    });

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            session::clear_credential_cookie(&state.config.auth.cookie_name),
        )],
        Json(body),
    )
        .into_response())
}

// -- Password lifecycle --

/// POST /api/v1/users/forget-password: mails a single-use reset link
pub async fn forget_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgetPasswordRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::BadRequest("Please provide an email address".into()));
    }

    let user = {
        let conn = state.db.get()?;
        db::users::find_by_email(&conn, &email)?
    }
    .ok_or_else(|| AppError::NotFound("There is no user account with that email address".into()))?;

    let minutes = state.config.auth.reset_token_minutes;
    let token = ResetToken::generate();
    let expires_at = (Utc::now() + Duration::minutes(minutes)).timestamp();
    {
        let conn = state.db.get()?;
        db::users::set_reset_token(&conn, &user.id, Some(&token.hash), Some(expires_at))?;
    }

    let email = mail::password_reset_email(
        &user.email,
        &state.config.reset_url(&token.plaintext),
        minutes,
    );
    if let Err(e) = state.mailer.send(email).await {
        let conn = state.db.get()?;
        db::users::set_reset_token(&conn, &user.id, None, None)?;
        return Err(AppError::Internal(format!("Failed to send reset email: {}", e)));
    }

    tracing::info!(user_id = %user.id, "Password reset requested");
    Ok(Json(serde_json::json!({
        "status": "Success",
        "message": "Check your mail to reset the password",
    }))
    .into_response())
}

/// PATCH /api/v1/users/resetpassword/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<Response> {
    let now = Utc::now().timestamp();
    let hash = password::hash_reset_token(&token);

    let user = {
        let conn = state.db.get()?;
        db::users::find_by_reset_token(&conn, &hash, now)?
    }
    .ok_or_else(|| AppError::BadRequest("Token is invalid or has expired".into()))?;

    password::validate_password(&req.newpassword)?;
    let password_hash = password::hash_password(&req.newpassword, state.config.auth.bcrypt_cost)?;

    let user = {
        let conn = state.db.get()?;
        db::users::set_password(&conn, &user.id, &password_hash, now)?;
        db::users::find_by_id(&conn, &user.id)?
    }
    .ok_or_else(|| AppError::NotFound("No user found with that ID".into()))?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    credential_response(&state, &user, "data")
}

/// PATCH /api/v1/users/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(req): ApiJson<UpdatePasswordRequest>,
) -> AppResult<Response> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide both current and new password".into(),
        ));
    }

    let conn = state.db.get()?;
    let user = db::users::find_by_id(&conn, &principal.id)?
        .ok_or_else(|| AppError::Unauthenticated("The user no longer exists".into()))?;

    if !password::verify_password(&req.current_password, &user.password_hash) {
        return Err(AppError::BadRequest("Incorrect current password".into()));
    }
    password::validate_password(&req.new_password)?;

    let password_hash = password::hash_password(&req.new_password, state.config.auth.bcrypt_cost)?;
    db::users::set_password(&conn, &user.id, &password_hash, Utc::now().timestamp())?;
    let user = db::users::find_by_id(&conn, &user.id)?
        .ok_or_else(|| AppError::Unauthenticated("The user no longer exists".into()))?;

    tracing::info!(user_id = %user.id, "Password changed");
    credential_response(&state, &user, "data")
}

// -- Profile --

/// GET /api/v1/users/me
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = db::users::find_by_id(&conn, &principal.id)?
        .ok_or_else(|| AppError::Unauthenticated("The user no longer exists".into()))?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "data": { "user": user },
    }))
    .into_response())
}

/// PATCH /api/v1/users/updateprofile
pub async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<Response> {
    let name = req.name.as_deref().map(normalize_name).transpose()?;

    let conn = state.db.get()?;
    db::users::update_profile(
        &conn,
        &principal.id,
        name.as_deref(),
        req.profile_pic.as_ref(),
    )?;
    let user = db::users::find_by_id(&conn, &principal.id)?
        .ok_or_else(|| AppError::Unauthenticated("The user no longer exists".into()))?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "body": { "user": user },
    }))
    .into_response())
}

// -- Administration --

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: Authorized<AdminsOnly>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let users = db::users::list(&conn)?;

    Ok(Json(serde_json::json!({
        "status": "Success",
        "results": users.len(),
        "data": { "users": users },
    }))
    .into_response())
}

/// DELETE /api/v1/users/delete-user/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    admin: Authorized<AdminsOnly>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    db::users::delete(&mut conn, &id)?;

    tracing::info!(user_id = %id, by = %admin.principal.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
