//! Item catalog service
//!
//! Items carry a denormalized `current_stock` total. Only the batch ledger
//! writes it; this service never touches stock levels.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::Item;

/// Item catalog service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    warehouse_id: Uuid,
    sku: String,
    name: String,
    serial_tracked: bool,
    current_stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            warehouse_id: row.warehouse_id,
            sku: row.sku,
            name: row.name,
            serial_tracked: row.serial_tracked,
            current_stock: row.current_stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for registering an item
#[derive(Debug, Deserialize)]
pub struct CreateItemInput {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub serial_tracked: bool,
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register an item. SKUs are unique per warehouse.
    pub async fn create(&self, warehouse_id: Uuid, input: CreateItemInput) -> AppResult<Item> {
        let sku = input.sku.trim();
        let name = input.name.trim();
        if sku.is_empty() {
            return Err(AppError::Validation {
                field: "sku".to_string(),
                message: "SKU must not be empty".to_string(),
            });
        }
        if name.is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name must not be empty".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (warehouse_id, sku, name, serial_tracked, current_stock)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING id, warehouse_id, sku, name, serial_tracked, current_stock, created_at, updated_at
            "#,
        )
        .bind(warehouse_id)
        .bind(sku)
        .bind(name)
        .bind(input.serial_tracked)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("SKU {} already exists", sku))
            }
            _ => AppError::DatabaseError(e),
        })?;

        Ok(row.into())
    }

    /// List items, alphabetically by SKU
    pub async fn list(&self, warehouse_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, warehouse_id, sku, name, serial_tracked, current_stock, created_at, updated_at
            FROM items
            WHERE warehouse_id = $1
            ORDER BY sku ASC
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Fetch one item
    pub async fn get(&self, warehouse_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, warehouse_id, sku, name, serial_tracked, current_stock, created_at, updated_at
            FROM items
            WHERE id = $1 AND warehouse_id = $2
            "#,
        )
        .bind(item_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }
}
