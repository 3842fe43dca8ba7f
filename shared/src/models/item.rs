//! Stocked item identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked product tracked by the engine
///
/// `current_stock` is a denormalized total and must equal both the sum of
/// `remaining_quantity` over the item's active batches and the sum of
/// quantities over its bin allocations. Every write path that touches batches
/// or allocations updates it in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub sku: String,
    pub name: String,
    /// Serial-tracked items carry serial numbers on every allocation
    /// and are counted one stock-count line per serial.
    pub serial_tracked: bool,
    pub current_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
