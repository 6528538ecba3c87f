//! Session token transport: `Authorization` header and session cookie

use std::time::Duration;

use http::header::AUTHORIZATION;
use http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "harbory_token";

/// Token from `Authorization` (with an optional `Bearer ` prefix) or, when
/// that header is absent, from the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    let token = match header {
        Some(value) => value.strip_prefix("Bearer ").unwrap_or(value).to_string(),
        None => CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())?,
    };

    Some(token).filter(|t| !t.is_empty())
}

/// Cookie carrying a freshly issued token
pub fn session_cookie(token: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Expired, empty session cookie that makes the browser drop its copy
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}
