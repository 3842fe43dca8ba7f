//! Damage report service
//!
//! A report holds no stock. Approval is the single point where stock leaves
//! the books: bin deallocation and FIFO batch write-off run in one
//! transaction, and `stock_adjusted` flips in the same commit so a report
//! can never deduct twice.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::DeductionPolicy;
use crate::error::{AppError, AppResult};
use crate::services::batch::{ensure_item_exists, BatchService};
use crate::services::bin::BinService;
use shared::{
    validate_bin_code, validate_positive_quantity, validate_serial_numbers, DamageReport,
    DamageStatus, DeductionType,
};

/// Damage report service
#[derive(Clone)]
pub struct DamageReportService {
    db: PgPool,
}

/// Database row for a damage report
#[derive(Debug, sqlx::FromRow)]
struct DamageReportRow {
    id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    bin: String,
    quantity: i64,
    serial_numbers: Vec<String>,
    description: String,
    photo_url: Option<String>,
    status: String,
    stock_adjusted: bool,
    reported_by: Uuid,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DamageReportRow {
    fn into_model(self) -> AppResult<DamageReport> {
        let status = DamageStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown damage report status: {}", self.status))
        })?;
        Ok(DamageReport {
            id: self.id,
            warehouse_id: self.warehouse_id,
            item_id: self.item_id,
            bin: self.bin,
            quantity: self.quantity,
            serial_numbers: self.serial_numbers,
            description: self.description,
            photo_url: self.photo_url,
            status,
            stock_adjusted: self.stock_adjusted,
            reported_by: self.reported_by,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        })
    }
}

const REPORT_COLUMNS: &str =
    "id, warehouse_id, item_id, bin, quantity, serial_numbers, description, photo_url, status, \
     stock_adjusted, reported_by, reviewed_by, reviewed_at, created_at";

/// Input for filing a damage report
#[derive(Debug, Deserialize)]
pub struct CreateDamageReportInput {
    pub item_id: Uuid,
    pub bin: String,
    pub quantity: i64,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
    pub description: String,
    pub photo_url: Option<String>,
}

impl DamageReportService {
    /// Create a new DamageReportService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// File a damage report. Stock is untouched until a supervisor approves.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        user_id: Uuid,
        input: CreateDamageReportInput,
    ) -> AppResult<DamageReport> {
        validate_bin_code(&input.bin).map_err(|msg| AppError::Validation {
            field: "bin".to_string(),
            message: msg.to_string(),
        })?;
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;
        validate_serial_numbers(input.quantity, &input.serial_numbers).map_err(|msg| {
            AppError::Validation {
                field: "serial_numbers".to_string(),
                message: msg.to_string(),
            }
        })?;
        if input.description.trim().is_empty() {
            return Err(AppError::Validation {
                field: "description".to_string(),
                message: "Description must not be empty".to_string(),
            });
        }
        ensure_item_exists(&self.db, warehouse_id, input.item_id).await?;

        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            r#"
            INSERT INTO damage_reports (warehouse_id, item_id, bin, quantity, serial_numbers,
                                        description, photo_url, status, stock_adjusted, reported_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', false, $8)
            RETURNING {REPORT_COLUMNS}
            "#,
        ))
        .bind(warehouse_id)
        .bind(input.item_id)
        .bind(&input.bin)
        .bind(input.quantity)
        .bind(&input.serial_numbers)
        .bind(input.description.trim())
        .bind(&input.photo_url)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        row.into_model()
    }

    /// Approve a report and write the stock off.
    ///
    /// Runs as one transaction: remove the damaged units from their bin,
    /// deduct them from the oldest batches, mark the report approved with
    /// `stock_adjusted = true`. The batch deduction tolerates a ledger
    /// shortfall so a report filed against stock the ledger has already lost
    /// track of can still be closed.
    pub async fn approve(
        &self,
        warehouse_id: Uuid,
        reviewer_id: Uuid,
        report_id: Uuid,
    ) -> AppResult<DamageReport> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM damage_reports WHERE id = $1 AND warehouse_id = $2 FOR UPDATE",
        ))
        .bind(report_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Damage report".to_string()))?;
        let report = row.into_model()?;

        if !report.status.is_reviewable() {
            return Err(AppError::InvalidStateTransition(format!(
                "Damage report {} is already {}",
                report_id,
                report.status.as_str()
            )));
        }

        let serials = if report.serial_numbers.is_empty() {
            None
        } else {
            Some(report.serial_numbers.as_slice())
        };
        BinService::deallocate_tx(
            &mut tx,
            warehouse_id,
            report.item_id,
            &report.bin,
            report.quantity,
            serials,
        )
        .await?;

        let origin = format!("damage:{}", report_id);
        let deduction = BatchService::deduct_tx(
            &mut tx,
            warehouse_id,
            report.item_id,
            report.quantity,
            DeductionType::Adjustment,
            Some(&origin),
            DeductionPolicy::AllowPartial,
        )
        .await?;
        if deduction.deducted < report.quantity {
            tracing::warn!(
                report_id = %report_id,
                item_id = %report.item_id,
                requested = report.quantity,
                deducted = deduction.deducted,
                "damage write-off exceeds active batch stock"
            );
        }

        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            r#"
            UPDATE damage_reports
            SET status = 'approved', stock_adjusted = true, reviewed_by = $1, reviewed_at = now()
            WHERE id = $2
            RETURNING {REPORT_COLUMNS}
            "#,
        ))
        .bind(reviewer_id)
        .bind(report_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            report_id = %report_id,
            item_id = %report.item_id,
            quantity = report.quantity,
            "damage report approved, stock written off"
        );

        row.into_model()
    }

    /// Reject a report. Stock is untouched; rejection is terminal.
    pub async fn reject(
        &self,
        warehouse_id: Uuid,
        reviewer_id: Uuid,
        report_id: Uuid,
    ) -> AppResult<DamageReport> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM damage_reports WHERE id = $1 AND warehouse_id = $2 FOR UPDATE",
        ))
        .bind(report_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Damage report".to_string()))?;
        let report = row.into_model()?;

        if !report.status.is_reviewable() {
            return Err(AppError::InvalidStateTransition(format!(
                "Damage report {} is already {}",
                report_id,
                report.status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            r#"
            UPDATE damage_reports
            SET status = 'rejected', reviewed_by = $1, reviewed_at = now()
            WHERE id = $2
            RETURNING {REPORT_COLUMNS}
            "#,
        ))
        .bind(reviewer_id)
        .bind(report_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// List damage reports, optionally by status, newest first
    pub async fn list(
        &self,
        warehouse_id: Uuid,
        status: Option<DamageStatus>,
    ) -> AppResult<Vec<DamageReport>> {
        let rows = sqlx::query_as::<_, DamageReportRow>(&format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM damage_reports
            WHERE warehouse_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(warehouse_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(DamageReportRow::into_model).collect()
    }

    /// Fetch one damage report
    pub async fn get(&self, warehouse_id: Uuid, report_id: Uuid) -> AppResult<DamageReport> {
        let row = sqlx::query_as::<_, DamageReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM damage_reports WHERE id = $1 AND warehouse_id = $2",
        ))
        .bind(report_id)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Damage report".to_string()))?;

        row.into_model()
    }
}
