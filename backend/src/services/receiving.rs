//! Receiving service
//!
//! One receipt covers a delivery. Each line becomes a FIFO batch and a
//! placement task in the same transaction, so received stock is never on the
//! books without a task telling someone where to put it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::batch::{ensure_item_exists, BatchService};
use crate::services::placement::PlacementService;
use shared::{
    validate_positive_quantity, validate_serial_numbers, PaginatedResponse, Pagination,
    PaginationMeta, PlacementTask,
};

/// Receiving service
#[derive(Clone)]
pub struct ReceivingService {
    db: PgPool,
}

/// A recorded delivery
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub reference: String,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One line of a recorded delivery
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReceiptLine {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    pub serial_numbers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for receiving a delivery
#[derive(Debug, Deserialize)]
pub struct ReceiveInput {
    /// Supplier document or ASN reference
    pub reference: String,
    pub lines: Vec<ReceiveLineInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveLineInput {
    pub item_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
}

/// Everything a receipt produced
#[derive(Debug, Serialize)]
pub struct ReceiveResult {
    pub receipt: Receipt,
    pub lines: Vec<ReceiptLine>,
    pub placement_tasks: Vec<PlacementTask>,
}

impl ReceivingService {
    /// Create a new ReceivingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a delivery: receipt, lines, batches, and placement tasks in
    /// one transaction.
    pub async fn receive(
        &self,
        warehouse_id: Uuid,
        user_id: Uuid,
        input: ReceiveInput,
    ) -> AppResult<ReceiveResult> {
        if input.reference.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reference".to_string(),
                message: "Reference must not be empty".to_string(),
            });
        }
        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "A receipt needs at least one line".to_string(),
            });
        }
        for line in &input.lines {
            validate_positive_quantity(line.quantity).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
            validate_serial_numbers(line.quantity, &line.serial_numbers).map_err(|msg| {
                AppError::Validation {
                    field: "serial_numbers".to_string(),
                    message: msg.to_string(),
                }
            })?;
            ensure_item_exists(&self.db, warehouse_id, line.item_id).await?;
        }

        let mut tx = self.db.begin().await?;

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (warehouse_id, reference, received_by)
            VALUES ($1, $2, $3)
            RETURNING id, warehouse_id, reference, received_by, created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(input.reference.trim())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        let mut placement_tasks = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let receipt_line = sqlx::query_as::<_, ReceiptLine>(
                r#"
                INSERT INTO receipt_lines (receipt_id, item_id, quantity, serial_numbers)
                VALUES ($1, $2, $3, $4)
                RETURNING id, receipt_id, item_id, quantity, serial_numbers, created_at
                "#,
            )
            .bind(receipt.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(&line.serial_numbers)
            .fetch_one(&mut *tx)
            .await?;

            BatchService::create_batch_tx(
                &mut tx,
                warehouse_id,
                line.item_id,
                line.quantity,
                None,
                Some(receipt.id),
            )
            .await?;

            let task = PlacementService::create_task_tx(
                &mut tx,
                warehouse_id,
                receipt.id,
                line.item_id,
                line.quantity,
                &line.serial_numbers,
            )
            .await?;

            lines.push(receipt_line);
            placement_tasks.push(task);
        }

        tx.commit().await?;

        tracing::info!(
            receipt_id = %receipt.id,
            reference = %receipt.reference,
            line_count = lines.len(),
            "delivery received"
        );

        Ok(ReceiveResult {
            receipt,
            lines,
            placement_tasks,
        })
    }

    /// Fetch one receipt with its lines
    pub async fn get(&self, warehouse_id: Uuid, receipt_id: Uuid) -> AppResult<(Receipt, Vec<ReceiptLine>)> {
        let receipt = sqlx::query_as::<_, Receipt>(
            "SELECT id, warehouse_id, reference, received_by, created_at FROM receipts WHERE id = $1 AND warehouse_id = $2",
        )
        .bind(receipt_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt".to_string()))?;

        let lines = sqlx::query_as::<_, ReceiptLine>(
            r#"
            SELECT id, receipt_id, item_id, quantity, serial_numbers, created_at
            FROM receipt_lines
            WHERE receipt_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&self.db)
        .await?;

        Ok((receipt, lines))
    }

    /// List receipts, newest first, paginated
    pub async fn list(
        &self,
        warehouse_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Receipt>> {
        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM receipts WHERE warehouse_id = $1",
        )
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, warehouse_id, reference, received_by, created_at
            FROM receipts
            WHERE warehouse_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(warehouse_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: receipts,
            pagination: PaginationMeta::new(pagination, total_items as u64),
        })
    }
}
