//! Placement task models
//!
//! One placement task per receipt line: freshly received stock that needs a
//! home in a bin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work item directing where newly received stock should be put
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementTask {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub receipt_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    pub serial_numbers: Vec<String>,
    /// System hint only; the picker may place anywhere
    pub suggested_bin: Option<String>,
    pub status: PlacementStatus,
    pub placed_bin: Option<String>,
    pub placed_by: Option<Uuid>,
    pub placed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `pending -> placed`, placed is terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Pending,
    Placed,
}

impl PlacementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementStatus::Pending => "pending",
            PlacementStatus::Placed => "placed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PlacementStatus::Pending),
            "placed" => Some(PlacementStatus::Placed),
            _ => None,
        }
    }
}
