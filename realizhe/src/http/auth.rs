use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::{AppState, Session};

pub const SESSION_COOKIE: &str = "realizhe-session";
pub const CART_COOKIE: &str = "realizhe-cart";

/// How long an anonymous cart cookie lives in the browser.
const CART_COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 3600);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let mut parts = raw.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// The session behind the request, if any.
///
/// A bearer token is checked against the session store first; otherwise it is
/// taken as a backend access token and resolved through the backend. Without a
/// bearer token the session cookie is used.
pub async fn current_session(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Option<Session> {
    if let Some(token) = bearer_token(headers) {
        if let Some(session) = state.sessions.get(token) {
            debug!("session resolved from bearer token");
            return Some(session);
        }
        return match state.backend.get_user(token).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "session resolved from backend access token");
                Some(Session {
                    user,
                    access_token: token.to_string(),
                })
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "access token lookup failed");
                None
            }
        };
    }

    let token = jar.get(SESSION_COOKIE)?.value().to_string();
    state.sessions.get(&token)
}

pub async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<Session, ApiError> {
    match current_session(state, headers, jar).await {
        Some(session) => Ok(session),
        None => {
            debug!("request without a valid session");
            Err(ApiError::Unauthorized)
        }
    }
}

fn max_age(duration: Duration) -> cookie::time::Duration {
    cookie::time::Duration::seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}

pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age(ttl))
        .build()
}

pub fn cart_cookie(cart_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((CART_COOKIE, cart_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age(CART_COOKIE_MAX_AGE))
        .build()
}

/// Removal cookie for `name`; path must match the one it was set with.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// First `x-forwarded-for` hop, else `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    forwarded.or_else(real_ip).map(String::from)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{bearer_token, client_ip};

    #[test]
    fn bearer_requires_scheme_and_single_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("bearer a b"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
