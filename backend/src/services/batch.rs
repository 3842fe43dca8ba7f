//! Batch ledger service: receipt lots consumed in strict FIFO order
//!
//! Every deduction runs as one transaction: batch rows are locked with
//! `SELECT ... FOR UPDATE`, updated, and their audit records inserted before
//! the commit, so concurrent sales can never read the same remaining quantity
//! and overdraw a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::DeductionPolicy;
use crate::error::{AppError, AppResult};
use crate::services::bin::BinService;
use shared::{
    plan_fifo_deduction, validate_positive_quantity, Batch, BatchDeduction, BatchStatus,
    DeductionOutcome, DeductionType,
};

/// Batch ledger service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Database row for a batch
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    initial_quantity: i64,
    remaining_quantity: i64,
    status: String,
    bin: Option<String>,
    source_receipt_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BatchRow {
    fn into_model(self) -> AppResult<Batch> {
        let status = BatchStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status: {}", self.status)))?;
        Ok(Batch {
            id: self.id,
            warehouse_id: self.warehouse_id,
            item_id: self.item_id,
            initial_quantity: self.initial_quantity,
            remaining_quantity: self.remaining_quantity,
            status,
            bin: self.bin,
            source_receipt_id: self.source_receipt_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for a batch deduction
#[derive(Debug, sqlx::FromRow)]
struct BatchDeductionRow {
    id: Uuid,
    batch_id: Uuid,
    quantity: i64,
    deduction_type: String,
    origin_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl BatchDeductionRow {
    fn into_model(self) -> AppResult<BatchDeduction> {
        let deduction_type = DeductionType::parse(&self.deduction_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown deduction type: {}", self.deduction_type))
        })?;
        Ok(BatchDeduction {
            id: self.id,
            batch_id: self.batch_id,
            quantity: self.quantity,
            deduction_type,
            origin_reference: self.origin_reference,
            created_at: self.created_at,
        })
    }
}

/// Input for creating a batch directly (receiving normally goes through
/// `ReceivingService`, which creates batches per receipt line)
#[derive(Debug, Deserialize)]
pub struct CreateBatchInput {
    pub item_id: Uuid,
    pub quantity: i64,
    pub bin: Option<String>,
    pub source_receipt_id: Option<Uuid>,
}

/// Input for a FIFO stock deduction
#[derive(Debug, Deserialize)]
pub struct DeductStockInput {
    pub item_id: Uuid,
    pub quantity: i64,
    pub deduction_type: DeductionType,
    /// Originating document reference (sale number, transfer number)
    pub origin_reference: Option<String>,
}

/// Result of a FIFO deduction: callers can always distinguish fully
/// satisfied, partially satisfied, and no-stock outcomes.
#[derive(Debug, Serialize)]
pub struct DeductStockResult {
    pub item_id: Uuid,
    pub requested: i64,
    pub deducted: i64,
    pub outcome: DeductionOutcome,
    pub deductions: Vec<BatchDeduction>,
}

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a batch for received stock
    pub async fn create_batch(&self, warehouse_id: Uuid, input: CreateBatchInput) -> AppResult<Batch> {
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let mut tx = self.db.begin().await?;
        let batch = Self::create_batch_tx(
            &mut tx,
            warehouse_id,
            input.item_id,
            input.quantity,
            input.bin.as_deref(),
            input.source_receipt_id,
        )
        .await?;
        tx.commit().await?;

        Ok(batch)
    }

    /// Insert a batch and bump the item's denormalized stock total inside an
    /// open transaction
    pub(crate) async fn create_batch_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        bin: Option<&str>,
        source_receipt_id: Option<Uuid>,
    ) -> AppResult<Batch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (warehouse_id, item_id, initial_quantity, remaining_quantity, status, bin, source_receipt_id)
            VALUES ($1, $2, $3, $3, 'active', $4, $5)
            RETURNING id, warehouse_id, item_id, initial_quantity, remaining_quantity, status, bin,
                      source_receipt_id, created_at, updated_at
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(quantity)
        .bind(bin)
        .bind(source_receipt_id)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE items SET current_stock = current_stock + $1, updated_at = now() WHERE id = $2 AND warehouse_id = $3",
        )
        .bind(quantity)
        .bind(item_id)
        .bind(warehouse_id)
        .execute(&mut *conn)
        .await?;

        row.into_model()
    }

    /// Deduct stock FIFO across the item's active batches.
    ///
    /// One transaction covers the batch updates, the audit inserts, the
    /// item's stock total, and the matching bin drain. Under the `reject`
    /// policy a shortfall rolls everything back; under `allow_partial` the
    /// available quantity commits and the shortfall is reported in the
    /// result.
    pub async fn deduct(
        &self,
        warehouse_id: Uuid,
        policy: DeductionPolicy,
        input: DeductStockInput,
    ) -> AppResult<DeductStockResult> {
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let mut tx = self.db.begin().await?;
        let result = Self::deduct_tx(
            &mut tx,
            warehouse_id,
            input.item_id,
            input.quantity,
            input.deduction_type,
            input.origin_reference.as_deref(),
            policy,
        )
        .await?;

        // Keep the bin side of the books in step with the ledger. Stock not
        // yet placed in a bin legitimately has no allocation to drain.
        let drained =
            BinService::drain_fifo_tx(&mut tx, warehouse_id, input.item_id, result.deducted).await?;
        if drained < result.deducted {
            tracing::warn!(
                item_id = %input.item_id,
                deducted = result.deducted,
                drained,
                "bin allocations cover less than the ledger deduction; stock may be awaiting placement"
            );
        }

        tx.commit().await?;

        tracing::info!(
            item_id = %input.item_id,
            requested = input.quantity,
            deducted = result.deducted,
            deduction_type = input.deduction_type.as_str(),
            "stock deducted"
        );

        Ok(result)
    }

    /// FIFO deduction inside an open transaction.
    ///
    /// Locks the candidate batches oldest-first, applies the plan, and writes
    /// one `BatchDeduction` per touched batch. Does not touch bin
    /// allocations; compose with `BinService` when the physical side moves
    /// too.
    pub(crate) async fn deduct_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: i64,
        deduction_type: DeductionType,
        origin_reference: Option<&str>,
        policy: DeductionPolicy,
    ) -> AppResult<DeductStockResult> {
        let candidates = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT id, remaining_quantity
            FROM batches
            WHERE warehouse_id = $1 AND item_id = $2 AND status = 'active' AND remaining_quantity > 0
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let plan = plan_fifo_deduction(&candidates, quantity);

        if !plan.outcome.is_full() && policy == DeductionPolicy::Reject {
            return Err(AppError::InsufficientStock(format!(
                "Item {} has {} of {} requested units in active batches",
                item_id,
                plan.total_taken(),
                quantity
            )));
        }

        let mut deductions = Vec::with_capacity(plan.takes.len());
        for take in &plan.takes {
            sqlx::query(
                r#"
                UPDATE batches
                SET remaining_quantity = remaining_quantity - $1,
                    status = CASE WHEN remaining_quantity - $1 = 0 THEN 'depleted' ELSE status END,
                    updated_at = now()
                WHERE id = $2
                "#,
            )
            .bind(take.quantity)
            .bind(take.batch_id)
            .execute(&mut *conn)
            .await?;

            let row = sqlx::query_as::<_, BatchDeductionRow>(
                r#"
                INSERT INTO batch_deductions (batch_id, quantity, deduction_type, origin_reference)
                VALUES ($1, $2, $3, $4)
                RETURNING id, batch_id, quantity, deduction_type, origin_reference, created_at
                "#,
            )
            .bind(take.batch_id)
            .bind(take.quantity)
            .bind(deduction_type.as_str())
            .bind(origin_reference)
            .fetch_one(&mut *conn)
            .await?;

            deductions.push(row.into_model()?);
        }

        let deducted = plan.total_taken();
        if deducted > 0 {
            sqlx::query(
                "UPDATE items SET current_stock = current_stock - $1, updated_at = now() WHERE id = $2 AND warehouse_id = $3",
            )
            .bind(deducted)
            .bind(item_id)
            .bind(warehouse_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(DeductStockResult {
            item_id,
            requested: quantity,
            deducted,
            outcome: plan.outcome,
            deductions,
        })
    }

    /// List batches for an item, oldest first
    pub async fn get_batches_for_item(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
        include_empty: bool,
    ) -> AppResult<Vec<Batch>> {
        ensure_item_exists(&self.db, warehouse_id, item_id).await?;

        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, warehouse_id, item_id, initial_quantity, remaining_quantity, status, bin,
                   source_receipt_id, created_at, updated_at
            FROM batches
            WHERE warehouse_id = $1 AND item_id = $2 AND ($3 OR status = 'active')
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(include_empty)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BatchRow::into_model).collect()
    }

    /// Audit trail for one batch
    pub async fn get_deductions(
        &self,
        warehouse_id: Uuid,
        batch_id: Uuid,
    ) -> AppResult<Vec<BatchDeduction>> {
        let batch_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1 AND warehouse_id = $2)",
        )
        .bind(batch_id)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        if !batch_exists {
            return Err(AppError::NotFound("Batch".to_string()));
        }

        let rows = sqlx::query_as::<_, BatchDeductionRow>(
            r#"
            SELECT id, batch_id, quantity, deduction_type, origin_reference, created_at
            FROM batch_deductions
            WHERE batch_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BatchDeductionRow::into_model).collect()
    }
}

/// Validate an item reference before opening the write transaction
pub(crate) async fn ensure_item_exists(
    db: &PgPool,
    warehouse_id: Uuid,
    item_id: Uuid,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = $1 AND warehouse_id = $2)",
    )
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_one(db)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Item".to_string()));
    }
    Ok(())
}
