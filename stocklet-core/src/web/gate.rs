use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;

use crate::error::AppError;
use crate::AppState;

pub const LOGIN_PAGE: &str = "/login";

const PUBLIC_PAGES: &[&str] = &["/login", "/register"];

/// Pages reachable without a session: the auth pages and static assets.
pub fn is_public_page(path: &str) -> bool {
    let trimmed = path.trim_end_matches('/');
    if PUBLIC_PAGES.contains(&trimmed) {
        return true;
    }

    trimmed
        .rsplit('/')
        .next()
        .map(|segment| segment.contains('.') && !segment.starts_with('.'))
        .unwrap_or(false)
}

/// Guards the frontend pages served outside `/api`.
///
/// Unmatched `/api` paths get a JSON 404 instead of the frontend bundle.
pub async fn page_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::NotFound("Not found".to_string()).into_response();
    }
    if is_public_page(path) {
        return next.run(request).await;
    }

    if state.auth.resolve_headers(request.headers(), Utc::now()).await.is_none() {
        return Redirect::to(LOGIN_PAGE).into_response();
    }

    next.run(request).await
}
