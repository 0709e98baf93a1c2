//! Inventory item endpoints.
//!
//! Items always belong to the caller that created them. Regular users only
//! see and touch their own items; superusers see everything.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CreateItemRequest, InventoryItem, InventoryItemResponse, InventoryListResponse,
    UpdateItemRequest, User,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_item_description, validate_item_name, validate_price, validate_stock, validate_uuid,
};
use super::Pagination;

/// Validate a CreateItemRequest
fn validate_create_request(req: &CreateItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_item_name(&req.name) {
        errors.add("name", &e);
    }

    if let Err(e) = validate_item_description(&req.description) {
        errors.add("description", &e);
    }

    if let Err(e) = validate_price(req.price) {
        errors.add("price", &e);
    }

    if let Err(e) = validate_stock(req.stock) {
        errors.add("stock", &e);
    }

    errors.finish()
}

/// Validate an UpdateItemRequest, checking only supplied fields
fn validate_update_request(req: &UpdateItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref name) = req.name {
        if let Err(e) = validate_item_name(name) {
            errors.add("name", &e);
        }
    }

    if let Err(e) = validate_item_description(&req.description) {
        errors.add("description", &e);
    }

    if let Some(price) = req.price {
        if let Err(e) = validate_price(price) {
            errors.add("price", &e);
        }
    }

    if let Some(stock) = req.stock {
        if let Err(e) = validate_stock(stock) {
            errors.add("stock", &e);
        }
    }

    errors.finish()
}

/// Fetch an item and check the caller may touch it
async fn fetch_owned_item(
    pool: &sqlx::SqlitePool,
    user: &User,
    id: &str,
) -> Result<InventoryItem, ApiError> {
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if !user.is_superuser && item.owner_id != user.id {
        return Err(ApiError::forbidden("Not enough permissions"));
    }

    Ok(item)
}

/// List items with pagination; regular users only see their own
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(page): Query<Pagination>,
) -> Result<Json<InventoryListResponse>, ApiError> {
    let (count, items) = if user.is_superuser {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM inventory_items")
            .fetch_one(&state.db)
            .await?;
        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items ORDER BY created_at LIMIT ? OFFSET ?",
        )
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&state.db)
        .await?;
        (count, items)
    } else {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM inventory_items WHERE owner_id = ?")
                .bind(&user.id)
                .fetch_one(&state.db)
                .await?;
        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT * FROM inventory_items WHERE owner_id = ? ORDER BY created_at LIMIT ? OFFSET ?",
        )
        .bind(&user.id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&state.db)
        .await?;
        (count, items)
    };

    Ok(Json(InventoryListResponse {
        data: items.into_iter().map(InventoryItemResponse::from).collect(),
        count: count.0,
    }))
}

/// Create a new item owned by the caller
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<InventoryItemResponse>), ApiError> {
    validate_create_request(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO inventory_items (id, owner_id, name, description, price, stock, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created =
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await?;

    tracing::info!(item = %created.name, owner = %user.email, "Item created");

    Ok((StatusCode::CREATED, Json(InventoryItemResponse::from(created))))
}

/// Get an item by id
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<InventoryItemResponse>, ApiError> {
    if let Err(e) = validate_uuid(&id, "item_id") {
        return Err(ApiError::validation_field("item_id", e));
    }

    let item = fetch_owned_item(&state.db, &user, &id).await?;

    Ok(Json(InventoryItemResponse::from(item)))
}

/// Update an item; absent fields are left unchanged
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<InventoryItemResponse>, ApiError> {
    if let Err(e) = validate_uuid(&id, "item_id") {
        return Err(ApiError::validation_field("item_id", e));
    }

    validate_update_request(&req)?;

    let _existing = fetch_owned_item(&state.db, &user, &id).await?;

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE inventory_items SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            price = COALESCE(?, price),
            stock = COALESCE(?, stock),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.stock)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated =
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(InventoryItemResponse::from(updated)))
}

/// Delete an item; the owner is unaffected
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Err(e) = validate_uuid(&id, "item_id") {
        return Err(ApiError::validation_field("item_id", e));
    }

    let item = fetch_owned_item(&state.db, &user, &id).await?;

    sqlx::query("DELETE FROM inventory_items WHERE id = ?")
        .bind(&item.id)
        .execute(&state.db)
        .await?;

    tracing::info!(item = %item.name, "Item deleted");

    Ok(StatusCode::NO_CONTENT)
}
