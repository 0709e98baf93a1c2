//! User management endpoints.
//!
//! Self-service endpoints live under /users/me; everything else requires a
//! superuser. Deleting a user is an explicit transaction that removes owned
//! inventory items and sessions before the user row itself, so no orphaned
//! item can survive the owner.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateUserRequest, RegisterUserRequest, UpdateMeRequest, UpdatePasswordRequest,
    UpdateUserRequest, User, UserListResponse, UserResponse,
};
use crate::AppState;

use super::auth::{hash_password, verify_password};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_email, validate_full_name, validate_password, validate_uuid,
};
use super::Pagination;

fn require_superuser(user: &User) -> Result<(), ApiError> {
    if !user.is_superuser {
        return Err(ApiError::forbidden("The user doesn't have enough privileges"));
    }
    Ok(())
}

/// Validate a CreateUserRequest
fn validate_create_request(req: &CreateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", &e);
    }

    if let Err(e) = validate_password(&req.password) {
        errors.add("password", &e);
    }

    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("full_name", &e);
    }

    errors.finish()
}

/// Validate a RegisterUserRequest
fn validate_register_request(req: &RegisterUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", &e);
    }

    if let Err(e) = validate_password(&req.password) {
        errors.add("password", &e);
    }

    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("full_name", &e);
    }

    errors.finish()
}

/// Validate an UpdateUserRequest, checking only supplied fields
fn validate_update_request(req: &UpdateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", &e);
        }
    }

    if let Some(ref password) = req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", &e);
        }
    }

    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("full_name", &e);
    }

    errors.finish()
}

/// Validate an UpdateMeRequest, checking only supplied fields
fn validate_update_me_request(req: &UpdateMeRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", &e);
        }
    }

    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("full_name", &e);
    }

    errors.finish()
}

/// Delete a user together with everything they own, in one transaction.
pub(crate) async fn delete_user_cascade(
    pool: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM inventory_items WHERE owner_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// List users with pagination (superuser only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(page): Query<Pagination>,
) -> Result<Json<UserListResponse>, ApiError> {
    require_superuser(&user)?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at LIMIT ? OFFSET ?",
    )
    .bind(page.limit)
    .bind(page.skip)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(UserListResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        count: count.0,
    }))
}

/// Create a new user (superuser only)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_superuser(&user)?;
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let hashed_password = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, hashed_password, full_name, is_active, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&hashed_password)
    .bind(&req.full_name)
    .bind(req.is_active)
    .bind(req.is_superuser)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::uniqueness_conflict("A user with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let created = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(email = %created.email, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Open registration; new accounts are always active and unprivileged
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_register_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let hashed_password = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, hashed_password, full_name, is_active, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&hashed_password)
    .bind(&req.full_name)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::uniqueness_conflict("A user with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let created = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(email = %created.email, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Get the current user
pub async fn get_me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Update the current user's own profile
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_update_me_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            email = COALESCE(?, email),
            full_name = COALESCE(?, full_name),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.email)
    .bind(&req.full_name)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::uniqueness_conflict("A user with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Change the current user's password
pub async fn update_password_me(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_password(&req.new_password) {
        return Err(ApiError::validation_field("new_password", e));
    }

    if !verify_password(&req.current_password, &user.hashed_password) {
        return Err(ApiError::bad_request("Incorrect password"));
    }

    if req.current_password == req.new_password {
        return Err(ApiError::bad_request(
            "New password cannot be the same as the current one",
        ));
    }

    let hashed_password = hash_password(&req.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET hashed_password = ?, updated_at = ? WHERE id = ?")
        .bind(&hashed_password)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the current user's own account
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<StatusCode, ApiError> {
    if user.is_superuser {
        return Err(ApiError::forbidden(
            "Super users are not allowed to delete themselves",
        ));
    }

    delete_user_cascade(&state.db, &user.id).await?;

    tracing::info!(email = %user.email, "User deleted their account");

    Ok(StatusCode::NO_CONTENT)
}

/// Get a user by id (self or superuser)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    if id != user.id {
        require_superuser(&user)?;
    }

    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(target)))
}

/// Update a user (superuser only); absent fields are left unchanged
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    require_superuser(&user)?;
    validate_update_request(&req)?;

    let _existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let hashed_password = match req.password.as_deref() {
        Some(password) => Some(
            hash_password(password)
                .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        ),
        None => None,
    };
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            email = COALESCE(?, email),
            hashed_password = COALESCE(?, hashed_password),
            full_name = COALESCE(?, full_name),
            is_active = COALESCE(?, is_active),
            is_superuser = COALESCE(?, is_superuser),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.email)
    .bind(&hashed_password)
    .bind(&req.full_name)
    .bind(req.is_active)
    .bind(req.is_superuser)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::uniqueness_conflict("A user with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user and everything they own (superuser only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    require_superuser(&user)?;

    if id == user.id {
        return Err(ApiError::forbidden(
            "Super users are not allowed to delete themselves",
        ));
    }

    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    delete_user_cascade(&state.db, &target.id).await?;

    tracing::info!(email = %target.email, "User deleted");

    Ok(StatusCode::NO_CONTENT)
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

    fn actor(id: &str, superuser: bool) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            hashed_password: String::new(),
            full_name: None,
            is_active: true,
            is_superuser: superuser,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn create_req(email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            is_active: true,
            is_superuser: false,
            full_name: None,
        }
    }

    async fn user_count(pool: &sqlx::SqlitePool) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap();
        count.0
    }

    #[tokio::test]
    async fn test_create_user_rejects_short_password() {
        let state = test_state().await;
        let admin = actor("admin", true);

        let err = create_user(
            State(state.clone()),
            admin,
            Json(create_req("a@b.com", "short")),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(user_count(&state.db).await, 0);
    }

    #[tokio::test]
    async fn test_create_user_rejects_long_password() {
        let state = test_state().await;
        let admin = actor("admin", true);

        let err = create_user(
            State(state.clone()),
            admin,
            Json(create_req("a@b.com", &"x".repeat(41))),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(user_count(&state.db).await, 0);
    }

    #[tokio::test]
    async fn test_create_user_requires_superuser() {
        let state = test_state().await;

        let err = create_user(
            State(state.clone()),
            actor("plain", false),
            Json(create_req("a@b.com", "longenough1")),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_and_first_survives() {
        let state = test_state().await;
        let admin = actor("admin", true);

        let (status, first) = create_user(
            State(state.clone()),
            actor("admin", true),
            Json(create_req("a@b.com", "longenough1")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = create_user(
            State(state.clone()),
            admin,
            Json(create_req("a@b.com", "otherpassword")),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::UniquenessConflict);
        assert_eq!(user_count(&state.db).await, 1);

        let survivor = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind("a@b.com")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(survivor.id, first.0.id);
    }

    #[tokio::test]
    async fn test_register_never_grants_superuser() {
        let state = test_state().await;

        let (_, response) = register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                email: "a@b.com".to_string(),
                password: "longenough1".to_string(),
                full_name: Some("Ada".to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(!response.0.is_superuser);
        assert!(response.0.is_active);
    }

    #[tokio::test]
    async fn test_update_user_partial_leaves_other_fields() {
        let state = test_state().await;
        let admin = actor("admin", true);

        let (_, created) = create_user(
            State(state.clone()),
            actor("admin", true),
            Json(CreateUserRequest {
                email: "a@b.com".to_string(),
                password: "longenough1".to_string(),
                is_active: true,
                is_superuser: false,
                full_name: Some("Ada".to_string()),
            }),
        )
        .await
        .unwrap();

        let updated = update_user(
            State(state.clone()),
            admin,
            Path(created.0.id.clone()),
            Json(UpdateUserRequest {
                email: None,
                password: None,
                full_name: Some("Ada Lovelace".to_string()),
                is_active: None,
                is_superuser: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.0.email, "a@b.com");
        assert_eq!(updated.0.full_name.as_deref(), Some("Ada Lovelace"));
        assert!(updated.0.is_active);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_to_items() {
        let state = test_state().await;
        let admin = actor("admin", true);

        let (_, created) = create_user(
            State(state.clone()),
            actor("admin", true),
            Json(create_req("owner@b.com", "longenough1")),
        )
        .await
        .unwrap();
        let owner_id = created.0.id.clone();

        for name in ["Widget", "Gadget"] {
            sqlx::query(
                "INSERT INTO inventory_items (id, owner_id, name, price, stock) VALUES (?, ?, ?, 9.99, 1)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&owner_id)
            .bind(name)
            .execute(&state.db)
            .await
            .unwrap();
        }

        let status = delete_user(State(state.clone()), admin, Path(owner_id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let orphans: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM inventory_items WHERE owner_id = ?")
                .bind(&owner_id)
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(orphans.0, 0);
        assert_eq!(user_count(&state.db).await, 0);
    }

    #[tokio::test]
    async fn test_superuser_cannot_delete_self() {
        let state = test_state().await;
        let admin_id = uuid::Uuid::new_v4().to_string();
        let admin = actor(&admin_id, true);

        let err = delete_user(State(state), admin, Path(admin_id))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
