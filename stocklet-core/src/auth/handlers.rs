use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::session::{removal_cookie, session_cookie, Session};
use crate::error::{ApiResponse, ApiResult, AppError};
use crate::models::user::{Credentials, User, UserResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Hash verified against when the email is unknown, so a missing account
/// costs the same bcrypt work as a wrong password.
async fn dummy_hash() -> Result<&'static String, AppError> {
    DUMMY_HASH
        .get_or_try_init(|| hash_password(Uuid::new_v4().to_string()))
        .await
}

/// Checks `password` for a looked-up user. Always runs one bcrypt verify.
async fn check_credentials(user: Option<User>, password: String) -> Result<User, AppError> {
    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => dummy_hash().await?.clone(),
    };
    let matched = verify_password(password, hash).await?;

    match user {
        Some(user) if matched => Ok(user),
        Some(user) => {
            warn!("Failed login for user {}", user.id);
            Err(AppError::InvalidCredentials)
        }
        None => Err(AppError::InvalidCredentials),
    }
}

async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(mut credentials): Json<Credentials>,
) -> ApiResult<UserResponse> {
    if !state.config.allow_registration {
        return Err(AppError::Forbidden("Registration is disabled".to_string()));
    }

    credentials.email = normalize_email(&credentials.email);
    credentials.validate()?;

    let password_hash = hash_password(credentials.password).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, email, password_hash, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&credentials.email)
    .bind(password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Email is already registered".to_string()),
        other => other,
    })?;

    info!("Registered user {}", user.id);
    Ok(ApiResponse::created(user.into()))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Response, AppError> {
    let email = normalize_email(&credentials.email);
    if email.is_empty() || credentials.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let user = find_user_by_email(&state.db, &email).await?;
    let user = check_credentials(user, credentials.password).await?;

    let issued = state.auth.issue(user.id, &user.email).map_err(|e| AppError::Internal(e.into()))?;
    let cookie = session_cookie(issued.token.clone(), state.auth.cookie_secure());

    info!("User {} logged in", user.id);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie.to_string())]),
        ApiResponse::ok(LoginResponse {
            token: issued.token,
            user: SessionUser {
                id: user.id,
                email: user.email,
            },
        }),
    )
        .into_response())
}

/// `POST /api/auth/refresh`
///
/// Reissues a token for any still-valid session, regardless of how close
/// it is to expiry.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let session = state
        .auth
        .resolve_headers(&headers, Utc::now())
        .await
        .ok_or(AppError::Unauthorized)?;

    let issued = state
        .auth
        .issue(session.user_id, &session.email)
        .map_err(|e| AppError::Internal(e.into()))?;
    let cookie = session_cookie(issued.token.clone(), state.auth.cookie_secure());

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie.to_string())]),
        ApiResponse::ok(json!({ "token": issued.token })),
    )
        .into_response())
}

/// `POST /api/auth/logout`
///
/// Revokes the current token if there is one; the cookie is cleared either way.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(session) = state.auth.resolve_headers(&headers, Utc::now()).await {
        state.auth.revoke(&session).await?;
        info!("User {} logged out, revoked {}", session.user_id, session.jti);
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, removal_cookie().to_string())]),
        ApiResponse::ok(json!({ "message": "Logged out" })),
    )
        .into_response())
}

/// `GET /api/auth/me`
pub async fn me(session: Session) -> ApiResult<SessionUser> {
    Ok(ApiResponse::ok(SessionUser {
        id: session.user_id,
        email: session.email,
    }))
}
