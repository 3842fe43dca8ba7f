//! Bin allocation tracker: where stock physically sits
//!
//! Allocations are keyed by (warehouse, item, bin). Deallocation checks the
//! on-hand quantity under a row lock and rejects shortfalls before anything
//! is written; quantities never go negative.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::batch::ensure_item_exists;
use shared::{
    check_serial_merge, take_serials, validate_bin_code, validate_positive_quantity,
    validate_serial_numbers, BinAllocation,
};

/// Bin allocation service
#[derive(Clone)]
pub struct BinService {
    db: PgPool,
}

/// Database row for a bin allocation
#[derive(Debug, sqlx::FromRow)]
struct BinAllocationRow {
    id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    bin: String,
    quantity: i64,
    serial_numbers: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BinAllocationRow> for BinAllocation {
    fn from(row: BinAllocationRow) -> Self {
        BinAllocation {
            id: row.id,
            warehouse_id: row.warehouse_id,
            item_id: row.item_id,
            bin: row.bin,
            quantity: row.quantity,
            serial_numbers: row.serial_numbers,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for a manual allocation or deallocation
#[derive(Debug, Deserialize)]
pub struct BinMovementInput {
    pub item_id: Uuid,
    pub bin: String,
    pub quantity: i64,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
}

impl BinService {
    /// Create a new BinService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Allocations for an item across all bins
    pub async fn query_item(&self, warehouse_id: Uuid, item_id: Uuid) -> AppResult<Vec<BinAllocation>> {
        ensure_item_exists(&self.db, warehouse_id, item_id).await?;

        let rows = sqlx::query_as::<_, BinAllocationRow>(
            r#"
            SELECT id, warehouse_id, item_id, bin, quantity, serial_numbers, created_at, updated_at
            FROM bin_allocations
            WHERE warehouse_id = $1 AND item_id = $2
            ORDER BY bin ASC
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Everything sitting in one bin
    pub async fn query_bin(&self, warehouse_id: Uuid, bin: &str) -> AppResult<Vec<BinAllocation>> {
        let rows = sqlx::query_as::<_, BinAllocationRow>(
            r#"
            SELECT id, warehouse_id, item_id, bin, quantity, serial_numbers, created_at, updated_at
            FROM bin_allocations
            WHERE warehouse_id = $1 AND bin = $2
            ORDER BY item_id ASC
            "#,
        )
        .bind(warehouse_id)
        .bind(bin)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Manual allocation (normally driven by placement tasks)
    pub async fn allocate(&self, warehouse_id: Uuid, input: BinMovementInput) -> AppResult<()> {
        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let mut tx = self.db.begin().await?;
        Self::allocate_tx(
            &mut tx,
            warehouse_id,
            input.item_id,
            &input.bin,
            input.quantity,
            &input.serial_numbers,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Manual deallocation (normally driven by transfers, damage, counts)
    pub async fn deallocate(&self, warehouse_id: Uuid, input: BinMovementInput) -> AppResult<()> {
        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let serials = if input.serial_numbers.is_empty() {
            None
        } else {
            Some(input.serial_numbers.as_slice())
        };

        let mut tx = self.db.begin().await?;
        Self::deallocate_tx(
            &mut tx,
            warehouse_id,
            input.item_id,
            &input.bin,
            input.quantity,
            serials,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Add stock to a bin inside an open transaction.
    ///
    /// An allocation row carries one serial per unit or none at all; merging
    /// stock that breaks that rule (or repeats a serial already at the bin)
    /// is rejected so the row never holds fewer serials than units.
    pub(crate) async fn allocate_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        bin: &str,
        quantity: i64,
        serial_numbers: &[String],
    ) -> AppResult<()> {
        validate_bin_code(bin).map_err(validation("bin"))?;
        validate_positive_quantity(quantity).map_err(validation("quantity"))?;
        validate_serial_numbers(quantity, serial_numbers).map_err(validation("serial_numbers"))?;

        let existing = sqlx::query_as::<_, (Uuid, Vec<String>)>(
            r#"
            SELECT id, serial_numbers
            FROM bin_allocations
            WHERE warehouse_id = $1 AND item_id = $2 AND bin = $3
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(bin)
        .fetch_optional(&mut *conn)
        .await?;

        match existing {
            Some((allocation_id, on_hand_serials)) => {
                check_serial_merge(&on_hand_serials, serial_numbers)
                    .map_err(validation("serial_numbers"))?;

                sqlx::query(
                    r#"
                    UPDATE bin_allocations
                    SET quantity = quantity + $1, serial_numbers = serial_numbers || $2,
                        updated_at = now()
                    WHERE id = $3
                    "#,
                )
                .bind(quantity)
                .bind(serial_numbers)
                .bind(allocation_id)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO bin_allocations (warehouse_id, item_id, bin, quantity, serial_numbers)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(warehouse_id)
                .bind(item_id)
                .bind(bin)
                .bind(quantity)
                .bind(serial_numbers)
                .execute(&mut *conn)
                .await?;
            }
        }

        Ok(())
    }

    /// Remove stock from a bin inside an open transaction.
    ///
    /// The allocation row is locked, the on-hand quantity checked, and the
    /// call fails with `InsufficientStock` naming the bin when the request
    /// exceeds it. Returns the serial numbers removed (empty for items
    /// without serials): explicit serials when the caller names them, oldest
    /// by insertion order when it does not.
    pub(crate) async fn deallocate_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        bin: &str,
        quantity: i64,
        serial_numbers: Option<&[String]>,
    ) -> AppResult<Vec<String>> {
        validate_bin_code(bin).map_err(validation("bin"))?;
        validate_positive_quantity(quantity).map_err(validation("quantity"))?;

        let row = sqlx::query_as::<_, (Uuid, i64, Vec<String>)>(
            r#"
            SELECT id, quantity, serial_numbers
            FROM bin_allocations
            WHERE warehouse_id = $1 AND item_id = $2 AND bin = $3
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(bin)
        .fetch_optional(&mut *conn)
        .await?;

        let (allocation_id, on_hand, on_hand_serials) = row.ok_or_else(|| {
            AppError::InsufficientStock(format!("No stock of item {} at bin {}", item_id, bin))
        })?;

        if quantity > on_hand {
            return Err(AppError::InsufficientStock(format!(
                "Bin {} holds {} of item {}, cannot remove {}",
                bin, on_hand, item_id, quantity
            )));
        }

        let (removed, remaining_serials) = if on_hand_serials.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let remaining = take_serials(&on_hand_serials, quantity as usize, serial_numbers)
                .map_err(validation("serial_numbers"))?;
            let removed = match serial_numbers {
                Some(serials) => serials.to_vec(),
                None => on_hand_serials[..quantity as usize].to_vec(),
            };
            (removed, remaining)
        };

        if quantity == on_hand {
            sqlx::query("DELETE FROM bin_allocations WHERE id = $1")
                .bind(allocation_id)
                .execute(&mut *conn)
                .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE bin_allocations
                SET quantity = quantity - $1, serial_numbers = $2, updated_at = now()
                WHERE id = $3
                "#,
            )
            .bind(quantity)
            .bind(&remaining_serials)
            .bind(allocation_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(removed)
    }

    /// Drain up to `quantity` units of an item from its bins, oldest
    /// allocation first. Used by sales, where the caller names no bin.
    /// Returns the quantity actually drained, which may fall short when
    /// stock has not been placed yet.
    pub(crate) async fn drain_fifo_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: i64,
    ) -> AppResult<i64> {
        if quantity <= 0 {
            return Ok(0);
        }

        let allocations = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT bin, quantity
            FROM bin_allocations
            WHERE warehouse_id = $1 AND item_id = $2 AND quantity > 0
            ORDER BY created_at ASC, bin ASC
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut still_needed = quantity;
        for (bin, on_hand) in allocations {
            if still_needed == 0 {
                break;
            }
            let take = still_needed.min(on_hand);
            Self::deallocate_tx(conn, warehouse_id, item_id, &bin, take, None).await?;
            still_needed -= take;
        }

        Ok(quantity - still_needed)
    }
}

/// Map a shared validation failure onto a field
fn validation(field: &'static str) -> impl Fn(&'static str) -> AppError {
    move |msg| AppError::Validation {
        field: field.to_string(),
        message: msg.to_string(),
    }
}
