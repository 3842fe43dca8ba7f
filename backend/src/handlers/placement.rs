//! Placement task handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::placement::{PlaceItemInput, PlacementService};
use crate::AppState;
use shared::{PlacementStatus, PlacementTask};

#[derive(Debug, Deserialize)]
pub struct PlacementListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFromReceiptInput {
    pub receipt_id: Uuid,
}

pub async fn create_from_receipt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateFromReceiptInput>,
) -> AppResult<Json<Vec<PlacementTask>>> {
    let service = PlacementService::new(state.db);
    let tasks = service
        .create_from_receipt(user.warehouse_id, input.receipt_id)
        .await?;
    Ok(Json(tasks))
}

pub async fn list_placements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PlacementListParams>,
) -> AppResult<Json<Vec<PlacementTask>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            PlacementStatus::parse(s).ok_or_else(|| AppError::Validation {
                field: "status".to_string(),
                message: format!("Unknown placement status: {}", s),
            })
        })
        .transpose()?;

    let service = PlacementService::new(state.db);
    let tasks = service.list(user.warehouse_id, status).await?;
    Ok(Json(tasks))
}

pub async fn get_placement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<Json<PlacementTask>> {
    let service = PlacementService::new(state.db);
    let task = service.get(user.warehouse_id, task_id).await?;
    Ok(Json(task))
}

pub async fn place_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(input): Json<PlaceItemInput>,
) -> AppResult<Json<PlacementTask>> {
    let service = PlacementService::new(state.db);
    let task = service
        .place_item(user.warehouse_id, user.user_id, task_id, input)
        .await?;
    Ok(Json(task))
}
