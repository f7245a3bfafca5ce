use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// -- Cookie helpers --

pub fn credential_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_credential_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

/// Bearer header first, then the credential cookie.
pub fn extract_credential<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| get_cookie_value(parts, cookie_name))
}

/// Signs a fresh credential for `user_id` and the Set-Cookie header carrying it.
pub fn issue_credential(state: &AppState, user_id: &str) -> AppResult<(String, HeaderMap)> {
    let token = state.tokens.issue(user_id)?;
    let cookie = credential_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.tokens.ttl().num_seconds(),
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))?,
    );
    Ok((token, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(header::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(name.clone(), *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn cookie_is_http_only_and_same_site() {
        let cookie = credential_cookie("jwt", "abc", 60);
        assert!(cookie.starts_with("jwt=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=60"));
    }

    #[test]
    fn clearing_cookie_expires_it() {
        assert!(clear_credential_cookie("jwt").contains("Max-Age=0"));
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let parts = parts_with(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "jwt=from-cookie"),
        ]);
        assert_eq!(extract_credential(&parts, "jwt"), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let parts = parts_with(&[(header::COOKIE, "theme=dark; jwt=from-cookie")]);
        assert_eq!(extract_credential(&parts, "jwt"), Some("from-cookie"));
    }

    #[test]
    fn cleared_cookie_counts_as_absent() {
        let parts = parts_with(&[(header::COOKIE, "jwt=")]);
        assert_eq!(extract_credential(&parts, "jwt"), None);
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let parts = parts_with(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_credential(&parts, "jwt"), None);
    }
}
