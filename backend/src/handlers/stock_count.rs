//! Stock count reconciliation handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::stock_count::{
    ApproveStockCountInput, CreateStockCountInput, RecordCountInput, StockCountService,
};
use crate::AppState;
use shared::{StockCount, StockCountItem, StockCountStatus};

#[derive(Debug, Deserialize)]
pub struct StockCountListParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockCountDetail {
    pub count: StockCount,
    pub items: Vec<StockCountItem>,
}

pub async fn create_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateStockCountInput>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service.create(user.warehouse_id, input).await?;
    Ok(Json(count))
}

pub async fn list_stock_counts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<StockCountListParams>,
) -> AppResult<Json<Vec<StockCount>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            StockCountStatus::parse(s).ok_or_else(|| AppError::Validation {
                field: "status".to_string(),
                message: format!("Unknown stock count status: {}", s),
            })
        })
        .transpose()?;

    let service = StockCountService::new(state.db);
    let counts = service.list(user.warehouse_id, status).await?;
    Ok(Json(counts))
}

pub async fn get_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCountDetail>> {
    let service = StockCountService::new(state.db);
    let (count, items) = service.get(user.warehouse_id, count_id).await?;
    Ok(Json(StockCountDetail { count, items }))
}

pub async fn start_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service.start(user.warehouse_id, count_id).await?;
    Ok(Json(count))
}

pub async fn record_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
    Json(input): Json<RecordCountInput>,
) -> AppResult<Json<StockCountItem>> {
    let service = StockCountService::new(state.db);
    let line = service.record_count(user.warehouse_id, count_id, input).await?;
    Ok(Json(line))
}

pub async fn submit_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service.submit(user.warehouse_id, count_id).await?;
    Ok(Json(count))
}

pub async fn approve_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
    Json(input): Json<ApproveStockCountInput>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service
        .approve(user.warehouse_id, user.user_id, count_id, input)
        .await?;
    Ok(Json(count))
}

pub async fn reject_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service
        .reject(user.warehouse_id, user.user_id, count_id)
        .await?;
    Ok(Json(count))
}

pub async fn recount_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service.recount(user.warehouse_id, count_id).await?;
    Ok(Json(count))
}

pub async fn complete_stock_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<StockCount>> {
    let service = StockCountService::new(state.db);
    let count = service.complete(user.warehouse_id, count_id).await?;
    Ok(Json(count))
}
