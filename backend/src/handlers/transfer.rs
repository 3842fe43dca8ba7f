//! Transfer task handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::transfer::{
    AdvanceStepInput, CreateTransferInput, CreateTransferOrderInput, TransferOrder,
    TransferService,
};
use crate::AppState;
use shared::{TransferStatus, TransferTask};

#[derive(Debug, Deserialize)]
pub struct TransferListParams {
    pub status: Option<String>,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<Json<TransferTask>> {
    let service = TransferService::new(state.db);
    let task = service.create(user.warehouse_id, input).await?;
    Ok(Json(task))
}

pub async fn create_transfer_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateTransferOrderInput>,
) -> AppResult<Json<TransferOrder>> {
    let service = TransferService::new(state.db);
    let order = service
        .create_order(user.warehouse_id, user.user_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn create_tasks_from_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<TransferTask>>> {
    let service = TransferService::new(state.db);
    let tasks = service
        .create_from_transfer_order(user.warehouse_id, order_id)
        .await?;
    Ok(Json(tasks))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<TransferListParams>,
) -> AppResult<Json<Vec<TransferTask>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            TransferStatus::parse(s).ok_or_else(|| AppError::Validation {
                field: "status".to_string(),
                message: format!("Unknown transfer status: {}", s),
            })
        })
        .transpose()?;

    let service = TransferService::new(state.db);
    let tasks = service.list(user.warehouse_id, status).await?;
    Ok(Json(tasks))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TransferTask>> {
    let service = TransferService::new(state.db);
    let task = service.get(user.warehouse_id, task_id).await?;
    Ok(Json(task))
}

pub async fn begin_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TransferTask>> {
    let service = TransferService::new(state.db);
    let task = service.begin(user.warehouse_id, task_id).await?;
    Ok(Json(task))
}

pub async fn advance_transfer_step(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(input): Json<AdvanceStepInput>,
) -> AppResult<Json<TransferTask>> {
    let service = TransferService::new(state.db);
    let task = service.advance_step(user.warehouse_id, task_id, input).await?;
    Ok(Json(task))
}

pub async fn complete_transfer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<TransferTask>> {
    let service = TransferService::new(state.db);
    let task = service
        .complete(user.warehouse_id, user.user_id, task_id)
        .await?;
    Ok(Json(task))
}
