//! Receiving handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::receiving::{Receipt, ReceiptLine, ReceiveInput, ReceiveResult, ReceivingService};
use crate::AppState;
use shared::{PaginatedResponse, Pagination};

#[derive(Debug, Serialize)]
pub struct ReceiptDetail {
    pub receipt: Receipt,
    pub lines: Vec<ReceiptLine>,
}

pub async fn receive(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ReceiveInput>,
) -> AppResult<Json<ReceiveResult>> {
    let service = ReceivingService::new(state.db);
    let result = service.receive(user.warehouse_id, user.user_id, input).await?;
    Ok(Json(result))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Receipt>>> {
    let service = ReceivingService::new(state.db);
    let receipts = service.list(user.warehouse_id, pagination).await?;
    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<ReceiptDetail>> {
    let service = ReceivingService::new(state.db);
    let (receipt, lines) = service.get(user.warehouse_id, receipt_id).await?;
    Ok(Json(ReceiptDetail { receipt, lines }))
}
