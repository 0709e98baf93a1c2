//! Login, sessions, and password hashing.
//!
//! Passwords are stored as argon2 hashes. Session tokens are random 32-byte
//! hex strings handed to the client once; only their SHA-256 digest is kept,
//! so a leaked sessions table cannot be replayed.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{LoginRequest, LoginResponse, Session, User, UserResponse};
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Unparseable hashes count as a
/// mismatch rather than an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn new_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Look up the unexpired session matching a presented token, if any.
async fn find_live_session(
    pool: &sqlx::SqlitePool,
    token: &str,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')")
        .bind(token_digest(token))
        .fetch_optional(pool)
        .await
}

/// Create a session row for a user and return the plaintext token
pub async fn create_session(
    pool: &sqlx::SqlitePool,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, sqlx::Error> {
    let token = new_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(ttl_days)).to_rfc3339();

    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(token_digest(&token))
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    // Same response for unknown email and wrong password
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !verify_password(&request.password, &user.hashed_password) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    tracing::info!(user = %user.email, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Token check endpoint; 200 when the presented token is a live session
pub async fn validate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| ApiError::unauthorized("Missing token"))?;

    match find_live_session(&state.db, &token).await? {
        Some(_) => Ok(StatusCode::OK),
        None => Err(ApiError::unauthorized("Invalid or expired token")),
    }
}

/// Middleware guarding the protected route tree
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing token"))?;

    match find_live_session(&state.db, &token).await? {
        Some(_) => Ok(next.run(request).await),
        None => Err(ApiError::unauthorized("Invalid or expired token")),
    }
}

/// Resolve a presented token to its user
pub async fn current_user(pool: &sqlx::SqlitePool, token: &str) -> Result<User, ApiError> {
    let session = find_live_session(pool, token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    // A session may outlive a deactivation
    if !user.is_active {
        return Err(ApiError::forbidden("Inactive user"));
    }

    Ok(user)
}

/// Handlers take `user: User` to get the authenticated caller
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Missing token"))?;
        current_user(&state.db, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;

    async fn test_state() -> Arc<AppState> {
        let pool = crate::db::init_test().await;
        Arc::new(AppState::new(Config::default(), pool))
    }

    async fn insert_user(
        pool: &sqlx::SqlitePool,
        email: &str,
        password: &str,
        active: bool,
    ) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let hashed = hash_password(password).unwrap();
        sqlx::query(
            "INSERT INTO users (id, email, hashed_password, is_active, is_superuser) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(email)
        .bind(&hashed)
        .bind(active)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("longenough1").unwrap();
        assert_ne!(hash, "longenough1");
        assert!(verify_password("longenough1", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("longenough1", "not-a-phc-string"));
    }

    #[test]
    fn test_token_digest_is_stable() {
        let token = new_token();
        assert_eq!(token.len(), 64);
        assert_eq!(token_digest(&token), token_digest(&token));
        assert_ne!(token_digest(&token), token);
    }

    #[tokio::test]
    async fn test_login_and_session_lookup() {
        let state = test_state().await;
        let id = insert_user(&state.db, "a@b.com", "longenough1", true).await;

        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@b.com".to_string(),
                password: "longenough1".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.user.id, id);

        let user = current_user(&state.db, &response.0.token).await.unwrap();
        assert_eq!(user.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let state = test_state().await;
        let err = current_user(&state.db, "deadbeef").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let state = test_state().await;
        insert_user(&state.db, "a@b.com", "longenough1", true).await;

        let err = login(
            State(state),
            Json(LoginRequest {
                email: "a@b.com".to_string(),
                password: "wrong-password".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_login_rejects_inactive_user() {
        let state = test_state().await;
        insert_user(&state.db, "a@b.com", "longenough1", false).await;

        let err = login(
            State(state),
            Json(LoginRequest {
                email: "a@b.com".to_string(),
                password: "longenough1".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
