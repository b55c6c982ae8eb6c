use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::auth::token::TOKEN_TTL_MINUTES;
use crate::error::AppError;
use crate::AppState;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Identity of the caller, resolved by `require_session` and stored in
/// request extensions.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Builds the httpOnly session cookie for `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::minutes(TOKEN_TTL_MINUTES))
        .build()
}

/// Cookie that instructs the browser to drop the session cookie.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

/// Session tokens carried by a request, cookie first, then bearer header.
pub fn token_candidates(headers: &HeaderMap) -> Vec<String> {
    let mut tokens = Vec::with_capacity(2);

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            tokens.push(cookie.value().to_string());
        }
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(bearer) = bearer {
        if !tokens.contains(&bearer) {
            tokens.push(bearer);
        }
    }

    tokens
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", SESSION_COOKIE);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Appends `cookie` as a `Set-Cookie` header.
pub fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("Could not encode session cookie: {}", e),
    }
}

/// Middleware guarding every protected API route.
///
/// Rejects with 401 (and clears the cookie) unless the request carries a
/// valid, unrevoked token. After the inner handler runs, a token close to
/// expiry is reissued on the same response.
pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(session) = state.auth.resolve_headers(request.headers(), Utc::now()).await else {
        return AppError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if state.auth.tokens().needs_refresh(session.expires_at, Utc::now())
        && !sets_session_cookie(&response)
    {
        match state.auth.issue(session.user_id, &session.email) {
            Ok(issued) => {
                let cookie = session_cookie(issued.token, state.auth.cookie_secure());
                append_cookie(&mut response, &cookie);
            }
            Err(e) => warn!("Failed to reissue token for {}: {}", session.user_id, e),
        }
    }

    response
}
