//! Transfer task models
//!
//! A transfer task is a multi-step physical move of an item from a source bin
//! to a destination bin. The step counter belongs to the handling UI; the
//! engine only cares that the task is not complete until explicitly marked so.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work item directing a bin-to-bin stock move
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferTask {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub transfer_order_id: Option<Uuid>,
    pub item_id: Uuid,
    pub source_bin: String,
    pub destination_bin: String,
    pub quantity: i64,
    /// Explicit serials to move; empty for non-serial-tracked items
    pub serial_numbers: Vec<String>,
    /// Opaque progress counter owned by the handling UI
    pub current_step: i32,
    pub urgency: TransferUrgency,
    pub status: TransferStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// `pending -> in_progress -> completed`; a task may stay in_progress
/// indefinitely if its steps are never finished
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::InProgress => "in_progress",
            TransferStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "in_progress" => Some(TransferStatus::InProgress),
            "completed" => Some(TransferStatus::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::InProgress)
                | (TransferStatus::InProgress, TransferStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferUrgency {
    Low,
    #[default]
    Normal,
    High,
}

impl TransferUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferUrgency::Low => "low",
            TransferUrgency::Normal => "normal",
            TransferUrgency::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TransferUrgency::Low),
            "normal" => Some(TransferUrgency::Normal),
            "high" => Some(TransferUrgency::High),
            _ => None,
        }
    }
}
