//! Damage report models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A damaged unit or lot found during counting or handling
///
/// Approval writes stock off exactly once: `stock_adjusted` flips to true in
/// the same transaction as the bin deallocation and the batch adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageReport {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub bin: String,
    pub quantity: i64,
    pub serial_numbers: Vec<String>,
    pub description: String,
    pub photo_url: Option<String>,
    pub status: DamageStatus,
    pub stock_adjusted: bool,
    pub reported_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `pending -> approved | rejected`, both terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DamageStatus {
    Pending,
    Approved,
    Rejected,
}

impl DamageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageStatus::Pending => "pending",
            DamageStatus::Approved => "approved",
            DamageStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DamageStatus::Pending),
            "approved" => Some(DamageStatus::Approved),
            "rejected" => Some(DamageStatus::Rejected),
            _ => None,
        }
    }

    /// Only pending reports may be reviewed; re-approving an approved report
    /// must never deduct stock a second time.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, DamageStatus::Pending)
    }
}
