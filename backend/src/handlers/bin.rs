//! Bin allocation handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::bin::{BinMovementInput, BinService};
use crate::AppState;
use shared::BinAllocation;

pub async fn list_allocations_for_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<BinAllocation>>> {
    let service = BinService::new(state.db);
    let allocations = service.query_item(user.warehouse_id, item_id).await?;
    Ok(Json(allocations))
}

pub async fn list_allocations_in_bin(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(bin): Path<String>,
) -> AppResult<Json<Vec<BinAllocation>>> {
    let service = BinService::new(state.db);
    let allocations = service.query_bin(user.warehouse_id, &bin).await?;
    Ok(Json(allocations))
}

pub async fn allocate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<BinMovementInput>,
) -> AppResult<Json<serde_json::Value>> {
    let service = BinService::new(state.db);
    service.allocate(user.warehouse_id, input).await?;
    Ok(Json(serde_json::json!({ "status": "allocated" })))
}

pub async fn deallocate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<BinMovementInput>,
) -> AppResult<Json<serde_json::Value>> {
    let service = BinService::new(state.db);
    service.deallocate(user.warehouse_id, input).await?;
    Ok(Json(serde_json::json!({ "status": "deallocated" })))
}
