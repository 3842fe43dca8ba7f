//! Transfer task service
//!
//! Stock stays at the source bin until the task is completed. Completion
//! deallocates the source and allocates the destination in one transaction,
//! moving the exact serial numbers that left the source bin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::batch::ensure_item_exists;
use crate::services::bin::BinService;
use shared::{
    validate_bin_code, validate_distinct_bins, validate_positive_quantity,
    validate_serial_numbers, TransferStatus, TransferTask, TransferUrgency,
};

/// Transfer task service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Database row for a transfer task
#[derive(Debug, sqlx::FromRow)]
struct TransferTaskRow {
    id: Uuid,
    warehouse_id: Uuid,
    transfer_order_id: Option<Uuid>,
    item_id: Uuid,
    source_bin: String,
    destination_bin: String,
    quantity: i64,
    serial_numbers: Vec<String>,
    current_step: i32,
    urgency: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    completed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TransferTaskRow {
    fn into_model(self) -> AppResult<TransferTask> {
        let status = TransferStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown transfer status: {}", self.status))
        })?;
        let urgency = TransferUrgency::parse(&self.urgency).ok_or_else(|| {
            AppError::Internal(format!("Unknown transfer urgency: {}", self.urgency))
        })?;
        Ok(TransferTask {
            id: self.id,
            warehouse_id: self.warehouse_id,
            transfer_order_id: self.transfer_order_id,
            item_id: self.item_id,
            source_bin: self.source_bin,
            destination_bin: self.destination_bin,
            quantity: self.quantity,
            serial_numbers: self.serial_numbers,
            current_step: self.current_step,
            urgency,
            status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            completed_by: self.completed_by,
            created_at: self.created_at,
        })
    }
}

const TASK_COLUMNS: &str =
    "id, warehouse_id, transfer_order_id, item_id, source_bin, destination_bin, quantity, \
     serial_numbers, current_step, urgency, status, started_at, completed_at, completed_by, \
     created_at";

/// A planning document grouping transfer tasks
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TransferOrder {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub reference: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a single transfer task
#[derive(Debug, Deserialize)]
pub struct CreateTransferInput {
    pub item_id: Uuid,
    pub source_bin: String,
    pub destination_bin: String,
    pub quantity: i64,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
    #[serde(default)]
    pub urgency: TransferUrgency,
}

/// Input for creating a transfer order with planned lines
#[derive(Debug, Deserialize)]
pub struct CreateTransferOrderInput {
    pub reference: String,
    pub lines: Vec<TransferOrderLineInput>,
}

/// One planned move; the source bin is resolved when tasks are generated
#[derive(Debug, Deserialize)]
pub struct TransferOrderLineInput {
    pub item_id: Uuid,
    pub destination_bin: String,
    pub quantity: i64,
}

/// Input for the step counter owned by the handling UI
#[derive(Debug, Deserialize)]
pub struct AdvanceStepInput {
    pub current_step: i32,
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a standalone transfer task
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        input: CreateTransferInput,
    ) -> AppResult<TransferTask> {
        Self::validate_move(
            &input.source_bin,
            &input.destination_bin,
            input.quantity,
            &input.serial_numbers,
        )?;
        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            r#"
            INSERT INTO transfer_tasks (warehouse_id, item_id, source_bin, destination_bin,
                                        quantity, serial_numbers, urgency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(warehouse_id)
        .bind(input.item_id)
        .bind(&input.source_bin)
        .bind(&input.destination_bin)
        .bind(input.quantity)
        .bind(&input.serial_numbers)
        .bind(input.urgency.as_str())
        .fetch_one(&self.db)
        .await?;

        row.into_model()
    }

    /// Record a transfer order and its planned lines
    pub async fn create_order(
        &self,
        warehouse_id: Uuid,
        user_id: Uuid,
        input: CreateTransferOrderInput,
    ) -> AppResult<TransferOrder> {
        if input.reference.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reference".to_string(),
                message: "Reference must not be empty".to_string(),
            });
        }
        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "A transfer order needs at least one line".to_string(),
            });
        }
        for line in &input.lines {
            validate_bin_code(&line.destination_bin).map_err(|msg| AppError::Validation {
                field: "destination_bin".to_string(),
                message: msg.to_string(),
            })?;
            validate_positive_quantity(line.quantity).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            })?;
            ensure_item_exists(&self.db, warehouse_id, line.item_id).await?;
        }

        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, TransferOrder>(
            r#"
            INSERT INTO transfer_orders (warehouse_id, reference, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, warehouse_id, reference, created_by, created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(input.reference.trim())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO transfer_order_lines (transfer_order_id, item_id, destination_bin, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id)
            .bind(line.item_id)
            .bind(&line.destination_bin)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Generate transfer tasks from a transfer order.
    ///
    /// Each line's source bin is the bin currently holding the most of the
    /// item; a line whose item has no allocation anywhere fails the whole
    /// call. Fails with `Conflict` when the order already has tasks.
    pub async fn create_from_transfer_order(
        &self,
        warehouse_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Vec<TransferTask>> {
        let order_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM transfer_orders WHERE id = $1 AND warehouse_id = $2)",
        )
        .bind(order_id)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;
        if !order_exists {
            return Err(AppError::NotFound("Transfer order".to_string()));
        }

        let already_generated = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM transfer_tasks WHERE transfer_order_id = $1)",
        )
        .bind(order_id)
        .fetch_one(&self.db)
        .await?;
        if already_generated {
            return Err(AppError::Conflict(format!(
                "Transfer order {} already has tasks",
                order_id
            )));
        }

        let lines = sqlx::query_as::<_, (Uuid, String, i64)>(
            "SELECT item_id, destination_bin, quantity FROM transfer_order_lines WHERE transfer_order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        let mut tx = self.db.begin().await?;
        let mut tasks = Vec::with_capacity(lines.len());
        for (item_id, destination_bin, quantity) in lines {
            let source_bin = sqlx::query_scalar::<_, String>(
                r#"
                SELECT bin FROM bin_allocations
                WHERE warehouse_id = $1 AND item_id = $2
                ORDER BY quantity DESC, bin ASC
                LIMIT 1
                "#,
            )
            .bind(warehouse_id)
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::InsufficientStock(format!("Item {} is not in any bin", item_id))
            })?;

            let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
                r#"
                INSERT INTO transfer_tasks (warehouse_id, transfer_order_id, item_id, source_bin,
                                            destination_bin, quantity, serial_numbers, urgency, status)
                VALUES ($1, $2, $3, $4, $5, $6, '{{}}', 'normal', 'pending')
                RETURNING {TASK_COLUMNS}
                "#,
            ))
            .bind(warehouse_id)
            .bind(order_id)
            .bind(item_id)
            .bind(&source_bin)
            .bind(&destination_bin)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;

            tasks.push(row.into_model()?);
        }
        tx.commit().await?;

        Ok(tasks)
    }

    /// Start working a pending task
    pub async fn begin(&self, warehouse_id: Uuid, task_id: Uuid) -> AppResult<TransferTask> {
        let mut tx = self.db.begin().await?;
        let task = Self::lock_task(&mut tx, warehouse_id, task_id).await?;

        if !task.status.can_transition_to(TransferStatus::InProgress) {
            return Err(AppError::InvalidStateTransition(format!(
                "Transfer task {} is {}, cannot start",
                task_id,
                task.status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            r#"
            UPDATE transfer_tasks SET status = 'in_progress', started_at = now()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Record progress on an in-progress task. The step value is opaque to
    /// the engine.
    pub async fn advance_step(
        &self,
        warehouse_id: Uuid,
        task_id: Uuid,
        input: AdvanceStepInput,
    ) -> AppResult<TransferTask> {
        let mut tx = self.db.begin().await?;
        let task = Self::lock_task(&mut tx, warehouse_id, task_id).await?;

        if task.status != TransferStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "Transfer task {} is {}, cannot record a step",
                task_id,
                task.status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            r#"
            UPDATE transfer_tasks SET current_step = $1
            WHERE id = $2
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(input.current_step)
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Complete a transfer: move the stock between bins and mark the task
    /// done, all in one transaction.
    ///
    /// The serials that actually left the source bin travel to the
    /// destination, so a serial can never be in two bins at once.
    pub async fn complete(
        &self,
        warehouse_id: Uuid,
        user_id: Uuid,
        task_id: Uuid,
    ) -> AppResult<TransferTask> {
        let mut tx = self.db.begin().await?;
        let task = Self::lock_task(&mut tx, warehouse_id, task_id).await?;

        if !task.status.can_transition_to(TransferStatus::Completed) {
            return Err(AppError::InvalidStateTransition(format!(
                "Transfer task {} is {}, cannot complete",
                task_id,
                task.status.as_str()
            )));
        }

        let requested_serials = if task.serial_numbers.is_empty() {
            None
        } else {
            Some(task.serial_numbers.as_slice())
        };
        let moved = BinService::deallocate_tx(
            &mut tx,
            warehouse_id,
            task.item_id,
            &task.source_bin,
            task.quantity,
            requested_serials,
        )
        .await?;
        BinService::allocate_tx(
            &mut tx,
            warehouse_id,
            task.item_id,
            &task.destination_bin,
            task.quantity,
            &moved,
        )
        .await?;

        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            r#"
            UPDATE transfer_tasks
            SET status = 'completed', completed_at = now(), completed_by = $1
            WHERE id = $2
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            task_id = %task_id,
            item_id = %task.item_id,
            source_bin = %task.source_bin,
            destination_bin = %task.destination_bin,
            quantity = task.quantity,
            "transfer completed"
        );

        row.into_model()
    }

    /// List transfer tasks, optionally by status, most urgent and newest
    /// first
    pub async fn list(
        &self,
        warehouse_id: Uuid,
        status: Option<TransferStatus>,
    ) -> AppResult<Vec<TransferTask>> {
        let rows = sqlx::query_as::<_, TransferTaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM transfer_tasks
            WHERE warehouse_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY CASE urgency WHEN 'high' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END,
                     created_at DESC
            "#,
        ))
        .bind(warehouse_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(TransferTaskRow::into_model).collect()
    }

    /// Fetch one transfer task
    pub async fn get(&self, warehouse_id: Uuid, task_id: Uuid) -> AppResult<TransferTask> {
        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM transfer_tasks WHERE id = $1 AND warehouse_id = $2",
        ))
        .bind(task_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer task".to_string()))?;

        row.into_model()
    }

    async fn lock_task(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        warehouse_id: Uuid,
        task_id: Uuid,
    ) -> AppResult<TransferTask> {
        let row = sqlx::query_as::<_, TransferTaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM transfer_tasks WHERE id = $1 AND warehouse_id = $2 FOR UPDATE",
        ))
        .bind(task_id)
        .bind(warehouse_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer task".to_string()))?;

        row.into_model()
    }

    fn validate_move(
        source_bin: &str,
        destination_bin: &str,
        quantity: i64,
        serial_numbers: &[String],
    ) -> AppResult<()> {
        validate_bin_code(source_bin).map_err(|msg| AppError::Validation {
            field: "source_bin".to_string(),
            message: msg.to_string(),
        })?;
        validate_bin_code(destination_bin).map_err(|msg| AppError::Validation {
            field: "destination_bin".to_string(),
            message: msg.to_string(),
        })?;
        validate_distinct_bins(source_bin, destination_bin).map_err(|msg| {
            AppError::Validation {
                field: "destination_bin".to_string(),
                message: msg.to_string(),
            }
        })?;
        validate_positive_quantity(quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;
        validate_serial_numbers(quantity, serial_numbers).map_err(|msg| AppError::Validation {
            field: "serial_numbers".to_string(),
            message: msg.to_string(),
        })?;
        Ok(())
    }
}
