//! Placement task service
//!
//! Receiving fans out one placement task per receipt line. Completing a task
//! allocates the stock to the chosen bin and back-fills the bin on the
//! batches that came from the same receipt, all in one transaction.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::bin::BinService;
use shared::{validate_bin_code, PlacementStatus, PlacementTask};

/// Placement task service
#[derive(Clone)]
pub struct PlacementService {
    db: PgPool,
}

/// Database row for a placement task
#[derive(Debug, sqlx::FromRow)]
struct PlacementTaskRow {
    id: Uuid,
    warehouse_id: Uuid,
    receipt_id: Uuid,
    item_id: Uuid,
    quantity: i64,
    serial_numbers: Vec<String>,
    suggested_bin: Option<String>,
    status: String,
    placed_bin: Option<String>,
    placed_by: Option<Uuid>,
    placed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PlacementTaskRow {
    fn into_model(self) -> AppResult<PlacementTask> {
        let status = PlacementStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown placement status: {}", self.status))
        })?;
        Ok(PlacementTask {
            id: self.id,
            warehouse_id: self.warehouse_id,
            receipt_id: self.receipt_id,
            item_id: self.item_id,
            quantity: self.quantity,
            serial_numbers: self.serial_numbers,
            suggested_bin: self.suggested_bin,
            status,
            placed_bin: self.placed_bin,
            placed_by: self.placed_by,
            placed_at: self.placed_at,
            created_at: self.created_at,
        })
    }
}

const TASK_COLUMNS: &str = "id, warehouse_id, receipt_id, item_id, quantity, serial_numbers, \
                            suggested_bin, status, placed_bin, placed_by, placed_at, created_at";

/// Input for completing a placement task
#[derive(Debug, Deserialize)]
pub struct PlaceItemInput {
    pub bin: String,
}

impl PlacementService {
    /// Create a new PlacementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Fan placement tasks out from a receipt's lines.
    ///
    /// Receiving does this automatically; this entry point covers receipts
    /// imported before the engine existed. Fails with `Conflict` when the
    /// receipt already has tasks.
    pub async fn create_from_receipt(
        &self,
        warehouse_id: Uuid,
        receipt_id: Uuid,
    ) -> AppResult<Vec<PlacementTask>> {
        let receipt_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM receipts WHERE id = $1 AND warehouse_id = $2)",
        )
        .bind(receipt_id)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;
        if !receipt_exists {
            return Err(AppError::NotFound("Receipt".to_string()));
        }

        let already_fanned_out = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM placement_tasks WHERE receipt_id = $1)",
        )
        .bind(receipt_id)
        .fetch_one(&self.db)
        .await?;
        if already_fanned_out {
            return Err(AppError::Conflict(format!(
                "Receipt {} already has placement tasks",
                receipt_id
            )));
        }

        let lines = sqlx::query_as::<_, (Uuid, i64, Vec<String>)>(
            "SELECT item_id, quantity, serial_numbers FROM receipt_lines WHERE receipt_id = $1 ORDER BY created_at ASC",
        )
        .bind(receipt_id)
        .fetch_all(&self.db)
        .await?;

        let mut tx = self.db.begin().await?;
        let mut tasks = Vec::with_capacity(lines.len());
        for (item_id, quantity, serial_numbers) in lines {
            let task = Self::create_task_tx(
                &mut tx,
                warehouse_id,
                receipt_id,
                item_id,
                quantity,
                &serial_numbers,
            )
            .await?;
            tasks.push(task);
        }
        tx.commit().await?;

        Ok(tasks)
    }

    /// Create one placement task inside an open transaction. The suggested
    /// bin is the bin already holding the most of this item, if any.
    pub(crate) async fn create_task_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        receipt_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        serial_numbers: &[String],
    ) -> AppResult<PlacementTask> {
        let suggested_bin = sqlx::query_scalar::<_, String>(
            r#"
            SELECT bin FROM bin_allocations
            WHERE warehouse_id = $1 AND item_id = $2
            ORDER BY quantity DESC, bin ASC
            LIMIT 1
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, PlacementTaskRow>(&format!(
            r#"
            INSERT INTO placement_tasks (warehouse_id, receipt_id, item_id, quantity, serial_numbers, suggested_bin, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(warehouse_id)
        .bind(receipt_id)
        .bind(item_id)
        .bind(quantity)
        .bind(serial_numbers)
        .bind(suggested_bin)
        .fetch_one(&mut *conn)
        .await?;

        row.into_model()
    }

    /// Complete a placement: allocate the stock to the chosen bin and mark
    /// the task placed.
    ///
    /// The chosen bin may differ from the suggestion. Batches created from
    /// the same receipt that have no bin yet are stamped with it so the
    /// ledger can say where each lot sits.
    pub async fn place_item(
        &self,
        warehouse_id: Uuid,
        user_id: Uuid,
        task_id: Uuid,
        input: PlaceItemInput,
    ) -> AppResult<PlacementTask> {
        validate_bin_code(&input.bin).map_err(|msg| AppError::Validation {
            field: "bin".to_string(),
            message: msg.to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, PlacementTaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM placement_tasks WHERE id = $1 AND warehouse_id = $2 FOR UPDATE",
        ))
        .bind(task_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Placement task".to_string()))?;
        let task = row.into_model()?;

        if task.status != PlacementStatus::Pending {
            return Err(AppError::InvalidStateTransition(format!(
                "Placement task {} is already {}",
                task_id,
                task.status.as_str()
            )));
        }

        BinService::allocate_tx(
            &mut tx,
            warehouse_id,
            task.item_id,
            &input.bin,
            task.quantity,
            &task.serial_numbers,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE batches SET bin = $1, updated_at = now()
            WHERE warehouse_id = $2 AND item_id = $3 AND source_receipt_id = $4 AND bin IS NULL
            "#,
        )
        .bind(&input.bin)
        .bind(warehouse_id)
        .bind(task.item_id)
        .bind(task.receipt_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, PlacementTaskRow>(&format!(
            r#"
            UPDATE placement_tasks
            SET status = 'placed', placed_bin = $1, placed_by = $2, placed_at = now()
            WHERE id = $3
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(&input.bin)
        .bind(user_id)
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            task_id = %task_id,
            item_id = %task.item_id,
            bin = %input.bin,
            "placement completed"
        );

        row.into_model()
    }

    /// List placement tasks, optionally by status, newest first
    pub async fn list(
        &self,
        warehouse_id: Uuid,
        status: Option<PlacementStatus>,
    ) -> AppResult<Vec<PlacementTask>> {
        let rows = sqlx::query_as::<_, PlacementTaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM placement_tasks
            WHERE warehouse_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(warehouse_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PlacementTaskRow::into_model).collect()
    }

    /// Fetch one placement task
    pub async fn get(&self, warehouse_id: Uuid, task_id: Uuid) -> AppResult<PlacementTask> {
        let row = sqlx::query_as::<_, PlacementTaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM placement_tasks WHERE id = $1 AND warehouse_id = $2",
        ))
        .bind(task_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Placement task".to_string()))?;

        row.into_model()
    }
}
