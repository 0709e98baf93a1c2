pub mod auth;
mod error;
mod inventory;
mod users;
mod validation;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Common skip/limit query parameters for list endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/validate", get(auth::validate));

    // Open registration (no token required)
    let open_routes = Router::new().route("/users/signup", post(users::register_user));

    // Protected API routes
    let api_routes = Router::new()
        // Users
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/me", get(users::get_me))
        .route("/users/me", patch(users::update_me))
        .route("/users/me", delete(users::delete_me))
        .route("/users/me/password", patch(users::update_password_me))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", patch(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        // Inventory
        .route("/inventory", get(inventory::list_items))
        .route("/inventory", post(inventory::create_item))
        .route("/inventory/:id", get(inventory::get_item))
        .route("/inventory/:id", put(inventory::update_item))
        .route("/inventory/:id", delete(inventory::delete_item))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        // Merge open routes (no auth)
        .merge(open_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
