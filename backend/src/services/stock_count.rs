//! Stock count reconciliation service
//!
//! A count snapshots book stock for one bin, collects physical counts, and
//! gates any book adjustment behind an approval. Parent aggregates are
//! recomputed from the lines on every write, never incremented in place.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::DeductionPolicy;
use crate::error::{AppError, AppResult};
use crate::services::batch::BatchService;
use crate::services::bin::BinService;
use shared::{
    count_line_status, count_variance, recompute_aggregates, validate_bin_code,
    validate_counted_quantity, validate_serial_line_count, CountItemStatus, DeductionType,
    StockCount, StockCountItem, StockCountStatus,
};

/// Stock count service
#[derive(Clone)]
pub struct StockCountService {
    db: PgPool,
}

/// Database row for a stock count
#[derive(Debug, sqlx::FromRow)]
struct StockCountRow {
    id: Uuid,
    warehouse_id: Uuid,
    bin: String,
    source_receipt_id: Option<Uuid>,
    status: String,
    assigned_to: Option<Uuid>,
    due_date: Option<NaiveDate>,
    counted_items: i64,
    matched_items: i64,
    mismatched_items: i64,
    accuracy_percentage: Decimal,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockCountRow {
    fn into_model(self) -> AppResult<StockCount> {
        let status = StockCountStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown stock count status: {}", self.status))
        })?;
        Ok(StockCount {
            id: self.id,
            warehouse_id: self.warehouse_id,
            bin: self.bin,
            source_receipt_id: self.source_receipt_id,
            status,
            assigned_to: self.assigned_to,
            due_date: self.due_date,
            counted_items: self.counted_items,
            matched_items: self.matched_items,
            mismatched_items: self.mismatched_items,
            accuracy_percentage: self.accuracy_percentage,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for a stock count line
#[derive(Debug, sqlx::FromRow)]
struct StockCountItemRow {
    id: Uuid,
    stock_count_id: Uuid,
    item_id: Uuid,
    serial_number: Option<String>,
    expected_quantity: i64,
    counted_quantity: Option<i64>,
    variance: Option<i64>,
    status: String,
    adjustment_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockCountItemRow {
    fn into_model(self) -> AppResult<StockCountItem> {
        let status = CountItemStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown count line status: {}", self.status))
        })?;
        Ok(StockCountItem {
            id: self.id,
            stock_count_id: self.stock_count_id,
            item_id: self.item_id,
            serial_number: self.serial_number,
            expected_quantity: self.expected_quantity,
            counted_quantity: self.counted_quantity,
            variance: self.variance,
            status,
            adjustment_reason: self.adjustment_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COUNT_COLUMNS: &str =
    "id, warehouse_id, bin, source_receipt_id, status, assigned_to, due_date, counted_items, \
     matched_items, mismatched_items, accuracy_percentage, started_at, submitted_at, reviewed_by, \
     reviewed_at, created_at, updated_at";

const LINE_COLUMNS: &str =
    "id, stock_count_id, item_id, serial_number, expected_quantity, counted_quantity, variance, \
     status, adjustment_reason, created_at, updated_at";

/// Input for scheduling a stock count
#[derive(Debug, Deserialize)]
pub struct CreateStockCountInput {
    pub bin: String,
    /// Limit the count to stock from one receipt instead of the whole bin
    pub source_receipt_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Input for recording one physical count
#[derive(Debug, Deserialize)]
pub struct RecordCountInput {
    pub stock_count_item_id: Uuid,
    pub counted_quantity: i64,
}

/// Input for approving a submitted count
#[derive(Debug, Deserialize, Default)]
pub struct ApproveStockCountInput {
    /// One entry per mismatched line; every mismatch needs a reason
    #[serde(default)]
    pub adjustments: Vec<AdjustmentInput>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentInput {
    pub stock_count_item_id: Uuid,
    pub reason: String,
}

impl StockCountService {
    /// Create a new StockCountService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Schedule a count and snapshot its expected lines.
    ///
    /// Serial-tracked items get one line per serial with an expected
    /// quantity of one; everything else gets one line per item with the
    /// bin's book quantity.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        input: CreateStockCountInput,
    ) -> AppResult<StockCount> {
        validate_bin_code(&input.bin).map_err(|msg| AppError::Validation {
            field: "bin".to_string(),
            message: msg.to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let count_row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            INSERT INTO stock_counts (warehouse_id, bin, source_receipt_id, status, assigned_to, due_date)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(warehouse_id)
        .bind(&input.bin)
        .bind(input.source_receipt_id)
        .bind(input.assigned_to)
        .bind(input.due_date)
        .fetch_one(&mut *tx)
        .await?;
        let count = count_row.into_model()?;

        let snapshot: Vec<(Uuid, i64, Vec<String>, bool)> = match input.source_receipt_id {
            Some(receipt_id) => {
                sqlx::query_as(
                    r#"
                    SELECT rl.item_id, rl.quantity, rl.serial_numbers, i.serial_tracked
                    FROM receipt_lines rl
                    JOIN receipts r ON r.id = rl.receipt_id
                    JOIN items i ON i.id = rl.item_id
                    WHERE rl.receipt_id = $1 AND r.warehouse_id = $2
                    ORDER BY rl.created_at ASC
                    "#,
                )
                .bind(receipt_id)
                .bind(warehouse_id)
                .fetch_all(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT ba.item_id, ba.quantity, ba.serial_numbers, i.serial_tracked
                    FROM bin_allocations ba
                    JOIN items i ON i.id = ba.item_id
                    WHERE ba.warehouse_id = $1 AND ba.bin = $2
                    ORDER BY ba.item_id ASC
                    "#,
                )
                .bind(warehouse_id)
                .bind(&input.bin)
                .fetch_all(&mut *tx)
                .await?
            }
        };

        for (item_id, quantity, serial_numbers, serial_tracked) in snapshot {
            if serial_tracked && !serial_numbers.is_empty() {
                for serial in &serial_numbers {
                    Self::insert_line_tx(&mut tx, count.id, item_id, Some(serial), 1).await?;
                }
            } else {
                Self::insert_line_tx(&mut tx, count.id, item_id, None, quantity).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(count_id = %count.id, bin = %count.bin, "stock count scheduled");
        Ok(count)
    }

    async fn insert_line_tx(
        conn: &mut PgConnection,
        stock_count_id: Uuid,
        item_id: Uuid,
        serial_number: Option<&str>,
        expected_quantity: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_count_items (stock_count_id, item_id, serial_number, expected_quantity, status)
            VALUES ($1, $2, $3, $4, 'pending')
            "#,
        )
        .bind(stock_count_id)
        .bind(item_id)
        .bind(serial_number)
        .bind(expected_quantity)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Move a pending count to in progress
    pub async fn start(&self, warehouse_id: Uuid, count_id: Uuid) -> AppResult<StockCount> {
        self.transition(
            warehouse_id,
            count_id,
            StockCountStatus::InProgress,
            "started_at = now()",
        )
        .await
    }

    /// Record one physical count against a line.
    ///
    /// The parent is locked first so concurrent recorders serialize, the
    /// line's variance and status are derived, and the parent aggregates are
    /// recomputed from all lines before commit.
    pub async fn record_count(
        &self,
        warehouse_id: Uuid,
        count_id: Uuid,
        input: RecordCountInput,
    ) -> AppResult<StockCountItem> {
        validate_counted_quantity(input.counted_quantity).map_err(|msg| AppError::Validation {
            field: "counted_quantity".to_string(),
            message: msg.to_string(),
        })?;

        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        if !count.status.accepts_counts() {
            return Err(AppError::InvalidStateTransition(format!(
                "Stock count {} is {}, not accepting counts",
                count_id, count.status
            )));
        }

        let line_row = sqlx::query_as::<_, StockCountItemRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM stock_count_items WHERE id = $1 AND stock_count_id = $2",
        ))
        .bind(input.stock_count_item_id)
        .bind(count_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock count line".to_string()))?;
        let line = line_row.into_model()?;

        if line.serial_number.is_some() {
            validate_serial_line_count(input.counted_quantity).map_err(|msg| {
                AppError::Validation {
                    field: "counted_quantity".to_string(),
                    message: msg.to_string(),
                }
            })?;
        }

        let variance = count_variance(line.expected_quantity, input.counted_quantity);
        let status = count_line_status(line.expected_quantity, Some(input.counted_quantity));

        let updated = sqlx::query_as::<_, StockCountItemRow>(&format!(
            r#"
            UPDATE stock_count_items
            SET counted_quantity = $1, variance = $2, status = $3, updated_at = now()
            WHERE id = $4
            RETURNING {LINE_COLUMNS}
            "#,
        ))
        .bind(input.counted_quantity)
        .bind(variance)
        .bind(status.as_str())
        .bind(line.id)
        .fetch_one(&mut *tx)
        .await?;

        Self::refresh_aggregates_tx(&mut tx, count_id).await?;
        tx.commit().await?;

        updated.into_model()
    }

    /// Submit an in-progress count for review. Every line must be counted.
    pub async fn submit(&self, warehouse_id: Uuid, count_id: Uuid) -> AppResult<StockCount> {
        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        Self::check_transition(&count, StockCountStatus::Submitted, count_id)?;

        let uncounted = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_count_items WHERE stock_count_id = $1 AND counted_quantity IS NULL",
        )
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;
        if uncounted > 0 {
            return Err(AppError::Validation {
                field: "counted_quantity".to_string(),
                message: format!("{} lines are still uncounted", uncounted),
            });
        }

        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            UPDATE stock_counts SET status = 'submitted', submitted_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Approve a submitted count and reconcile every mismatch.
    ///
    /// Each mismatched line must come with a reason. Overages create an
    /// adjustment batch and allocate the surplus to the counted bin;
    /// shortages deduct FIFO and deallocate from the bin. Everything runs
    /// in one transaction with the count marked approved at the end.
    pub async fn approve(
        &self,
        warehouse_id: Uuid,
        reviewer_id: Uuid,
        count_id: Uuid,
        input: ApproveStockCountInput,
    ) -> AppResult<StockCount> {
        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        Self::check_transition(&count, StockCountStatus::Approved, count_id)?;

        let line_rows = sqlx::query_as::<_, StockCountItemRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM stock_count_items WHERE stock_count_id = $1 ORDER BY created_at ASC",
        ))
        .bind(count_id)
        .fetch_all(&mut *tx)
        .await?;

        let origin = format!("stock_count:{}", count_id);
        for row in line_rows {
            let line = row.into_model()?;
            let variance = match line.variance {
                Some(v) if v != 0 => v,
                _ => continue,
            };

            let reason = input
                .adjustments
                .iter()
                .find(|a| a.stock_count_item_id == line.id)
                .map(|a| a.reason.trim())
                .filter(|r| !r.is_empty())
                .ok_or_else(|| AppError::Validation {
                    field: "adjustments".to_string(),
                    message: format!("Mismatched line {} needs an adjustment reason", line.id),
                })?;

            if variance > 0 {
                BatchService::create_batch_tx(
                    &mut tx,
                    warehouse_id,
                    line.item_id,
                    variance,
                    Some(&count.bin),
                    None,
                )
                .await?;
                // Surplus units have no known serials; the line's expected
                // serial is already on hand, re-attaching it would duplicate.
                BinService::allocate_tx(
                    &mut tx,
                    warehouse_id,
                    line.item_id,
                    &count.bin,
                    variance,
                    &[],
                )
                .await?;
            } else {
                let shortage = -variance;
                let line_serials: Vec<String> = line.serial_number.iter().cloned().collect();
                BatchService::deduct_tx(
                    &mut tx,
                    warehouse_id,
                    line.item_id,
                    shortage,
                    DeductionType::Adjustment,
                    Some(&origin),
                    DeductionPolicy::AllowPartial,
                )
                .await?;
                let serials = if line_serials.is_empty() {
                    None
                } else {
                    Some(line_serials.as_slice())
                };
                BinService::deallocate_tx(
                    &mut tx,
                    warehouse_id,
                    line.item_id,
                    &count.bin,
                    shortage,
                    serials,
                )
                .await?;
            }

            sqlx::query(
                "UPDATE stock_count_items SET adjustment_reason = $1, updated_at = now() WHERE id = $2",
            )
            .bind(reason)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            UPDATE stock_counts
            SET status = 'approved', reviewed_by = $1, reviewed_at = now(), updated_at = now()
            WHERE id = $2
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(reviewer_id)
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(count_id = %count_id, bin = %count.bin, "stock count approved");
        row.into_model()
    }

    /// Reject a submitted count. Lines are reset and no stock moves;
    /// rejection is terminal.
    pub async fn reject(
        &self,
        warehouse_id: Uuid,
        reviewer_id: Uuid,
        count_id: Uuid,
    ) -> AppResult<StockCount> {
        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        Self::check_transition(&count, StockCountStatus::Rejected, count_id)?;

        Self::reset_lines_tx(&mut tx, count_id).await?;

        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            UPDATE stock_counts
            SET status = 'rejected', counted_items = 0, matched_items = 0, mismatched_items = 0,
                accuracy_percentage = 0, reviewed_by = $1, reviewed_at = now(), updated_at = now()
            WHERE id = $2
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(reviewer_id)
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Send a submitted count back for a fresh pass. Lines are reset and
    /// the count returns to in progress.
    pub async fn recount(&self, warehouse_id: Uuid, count_id: Uuid) -> AppResult<StockCount> {
        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        Self::check_transition(&count, StockCountStatus::Recount, count_id)?;

        Self::reset_lines_tx(&mut tx, count_id).await?;

        // Recount is a transit state; the count goes straight back to the
        // counter's queue.
        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            UPDATE stock_counts
            SET status = 'in_progress', counted_items = 0, matched_items = 0, mismatched_items = 0,
                accuracy_percentage = 0, submitted_at = NULL, updated_at = now()
            WHERE id = $1
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Close an approved count
    pub async fn complete(&self, warehouse_id: Uuid, count_id: Uuid) -> AppResult<StockCount> {
        self.transition(
            warehouse_id,
            count_id,
            StockCountStatus::Completed,
            "updated_at = now()",
        )
        .await
    }

    /// Fetch one count with its lines
    pub async fn get(
        &self,
        warehouse_id: Uuid,
        count_id: Uuid,
    ) -> AppResult<(StockCount, Vec<StockCountItem>)> {
        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            "SELECT {COUNT_COLUMNS} FROM stock_counts WHERE id = $1 AND warehouse_id = $2",
        ))
        .bind(count_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock count".to_string()))?;
        let count = row.into_model()?;

        let line_rows = sqlx::query_as::<_, StockCountItemRow>(&format!(
            "SELECT {LINE_COLUMNS} FROM stock_count_items WHERE stock_count_id = $1 ORDER BY created_at ASC",
        ))
        .bind(count_id)
        .fetch_all(&self.db)
        .await?;
        let lines = line_rows
            .into_iter()
            .map(StockCountItemRow::into_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((count, lines))
    }

    /// List counts, optionally by status, newest first
    pub async fn list(
        &self,
        warehouse_id: Uuid,
        status: Option<StockCountStatus>,
    ) -> AppResult<Vec<StockCount>> {
        let rows = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            SELECT {COUNT_COLUMNS} FROM stock_counts
            WHERE warehouse_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(warehouse_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockCountRow::into_model).collect()
    }

    async fn lock_count(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        warehouse_id: Uuid,
        count_id: Uuid,
    ) -> AppResult<StockCount> {
        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            "SELECT {COUNT_COLUMNS} FROM stock_counts WHERE id = $1 AND warehouse_id = $2 FOR UPDATE",
        ))
        .bind(count_id)
        .bind(warehouse_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock count".to_string()))?;

        row.into_model()
    }

    fn check_transition(
        count: &StockCount,
        next: StockCountStatus,
        count_id: Uuid,
    ) -> AppResult<()> {
        if !count.status.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "Stock count {} cannot go from {} to {}",
                count_id, count.status, next
            )));
        }
        Ok(())
    }

    async fn transition(
        &self,
        warehouse_id: Uuid,
        count_id: Uuid,
        next: StockCountStatus,
        extra_set: &str,
    ) -> AppResult<StockCount> {
        let mut tx = self.db.begin().await?;
        let count = Self::lock_count(&mut tx, warehouse_id, count_id).await?;

        Self::check_transition(&count, next, count_id)?;

        let row = sqlx::query_as::<_, StockCountRow>(&format!(
            r#"
            UPDATE stock_counts SET status = $1, {extra_set}
            WHERE id = $2
            RETURNING {COUNT_COLUMNS}
            "#,
        ))
        .bind(next.as_str())
        .bind(count_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    async fn reset_lines_tx(conn: &mut PgConnection, count_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE stock_count_items
            SET counted_quantity = NULL, variance = NULL, status = 'pending',
                adjustment_reason = NULL, updated_at = now()
            WHERE stock_count_id = $1
            "#,
        )
        .bind(count_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Recompute the parent's aggregate columns from its lines
    async fn refresh_aggregates_tx(conn: &mut PgConnection, count_id: Uuid) -> AppResult<()> {
        let lines = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT expected_quantity, counted_quantity FROM stock_count_items WHERE stock_count_id = $1",
        )
        .bind(count_id)
        .fetch_all(&mut *conn)
        .await?;

        let agg = recompute_aggregates(&lines);

        sqlx::query(
            r#"
            UPDATE stock_counts
            SET counted_items = $1, matched_items = $2, mismatched_items = $3,
                accuracy_percentage = $4, updated_at = now()
            WHERE id = $5
            "#,
        )
        .bind(agg.counted_items)
        .bind(agg.matched_items)
        .bind(agg.mismatched_items)
        .bind(agg.accuracy_percentage)
        .bind(count_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
