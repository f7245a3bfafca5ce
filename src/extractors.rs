use std::marker::PhantomData;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::auth::session::extract_credential;
use crate::db;
use crate::db::models::{ImageRef, Role};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated identity attached to a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_pic: Option<ImageRef>,
}

impl Principal {
    /// Fails with Forbidden unless the principal holds one of `allowed`.
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You are not authorized to perform this action".into(),
            ))
        }
    }
}

/// Auth gate: requires a valid, current credential.
///
/// The credential comes from `Authorization: Bearer` or the credential
/// cookie. It is rejected when the signature or expiry is bad, when its user
/// no longer exists, or when that user changed password after it was issued.
/// The resolved principal is cached in the request extensions.
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let token = extract_credential(parts, &state.config.auth.cookie_name).ok_or_else(|| {
            AppError::Unauthenticated("You are not logged in. Please log in to get access".into())
        })?;

        let claims = state.tokens.verify(token)?;

        let user = {
            let conn = state.db.get()?;
            db::users::find_by_id(&conn, &claims.sub)?
        }
        .ok_or_else(|| {
            AppError::Unauthenticated("The user belonging to this token no longer exists".into())
        })?;

        if claims.predates_password_change(user.password_changed_at) {
            return Err(AppError::Unauthenticated(
                "You recently changed your password. Please log in again".into(),
            ));
        }

        let principal = Principal {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            profile_pic: user.profile_pic,
        };
        parts.extensions.insert(principal.clone());

        Ok(principal)
    }
}

/// A fixed set of roles a route admits.
pub trait RoleSet {
    const ALLOWED: &'static [Role];
}

pub struct UsersOnly;

impl RoleSet for UsersOnly {
    const ALLOWED: &'static [Role] = &[Role::User];
}

pub struct AdminsOnly;

impl RoleSet for AdminsOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Role guard: runs the auth gate, then checks the role against `R`.
pub struct Authorized<R> {
    pub principal: Principal,
    _roles: PhantomData<fn() -> R>,
}

impl<R: RoleSet> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal.require_any(R::ALLOWED)?;

        Ok(Authorized {
            principal,
            _roles: PhantomData,
        })
    }
}

/// JSON body whose rejections use the crate's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "u1".into(),
            name: "ALICE".into(),
            email: "alice@example.com".into(),
            role,
            profile_pic: None,
        }
    }

    #[test]
    fn role_in_set_is_admitted() {
        assert!(principal(Role::Admin).require_any(AdminsOnly::ALLOWED).is_ok());
        assert!(principal(Role::User).require_any(UsersOnly::ALLOWED).is_ok());
        assert!(principal(Role::User)
            .require_any(&[Role::User, Role::Admin])
            .is_ok());
    }

    #[test]
    fn role_outside_set_is_forbidden() {
        let err = principal(Role::User)
            .require_any(AdminsOnly::ALLOWED)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = principal(Role::Admin)
            .require_any(UsersOnly::ALLOWED)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
