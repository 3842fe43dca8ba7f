//! Batch ledger handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::batch::{BatchService, CreateBatchInput, DeductStockInput, DeductStockResult};
use crate::AppState;
use shared::{Batch, BatchDeduction};

#[derive(Debug, Deserialize)]
pub struct BatchListParams {
    #[serde(default)]
    pub include_empty: bool,
}

pub async fn create_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<Json<Batch>> {
    let service = BatchService::new(state.db);
    let batch = service.create_batch(user.warehouse_id, input).await?;
    Ok(Json(batch))
}

/// FIFO deduction across an item's active batches. The shortfall policy
/// comes from configuration, not from the request.
pub async fn deduct_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<DeductStockInput>,
) -> AppResult<Json<DeductStockResult>> {
    let policy = state.config.inventory.deduction_policy;
    let service = BatchService::new(state.db);
    let result = service.deduct(user.warehouse_id, policy, input).await?;
    Ok(Json(result))
}

pub async fn list_batches_for_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Query(params): Query<BatchListParams>,
) -> AppResult<Json<Vec<Batch>>> {
    let service = BatchService::new(state.db);
    let batches = service
        .get_batches_for_item(user.warehouse_id, item_id, params.include_empty)
        .await?;
    Ok(Json(batches))
}

pub async fn list_batch_deductions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<Vec<BatchDeduction>>> {
    let service = BatchService::new(state.db);
    let deductions = service.get_deductions(user.warehouse_id, batch_id).await?;
    Ok(Json(deductions))
}
