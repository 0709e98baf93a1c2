//! Inventory item models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItemResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
}

impl From<InventoryItem> for InventoryItemResponse {
    fn from(item: InventoryItem) -> Self {
        Self {
            id: item.id,
            owner_id: item.owner_id,
            name: item.name,
            description: item.description,
            price: item.price,
            stock: item.stock,
        }
    }
}

/// Paginated list envelope for item collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryListResponse {
    pub data: Vec<InventoryItemResponse>,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_stock_defaults_to_zero() {
        let req: CreateItemRequest =
            serde_json::from_str(r#"{"name":"Widget","price":9.99}"#).unwrap();
        assert_eq!(req.stock, 0);
        assert!(req.description.is_none());
    }

    #[test]
    fn test_response_projection_keeps_owner() {
        let item = InventoryItem {
            id: "i1".to_string(),
            owner_id: "u1".to_string(),
            name: "Widget".to_string(),
            description: None,
            price: 9.99,
            stock: 3,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let response = InventoryItemResponse::from(item);
        assert_eq!(response.owner_id, "u1");
        assert_eq!(response.stock, 3);
    }
}
