//! Damage report handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::damage::{CreateDamageReportInput, DamageReportService};
use crate::AppState;
use shared::{DamageReport, DamageStatus};

#[derive(Debug, Deserialize)]
pub struct DamageListParams {
    pub status: Option<String>,
}

pub async fn create_damage_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateDamageReportInput>,
) -> AppResult<Json<DamageReport>> {
    let service = DamageReportService::new(state.db);
    let report = service.create(user.warehouse_id, user.user_id, input).await?;
    Ok(Json(report))
}

pub async fn list_damage_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<DamageListParams>,
) -> AppResult<Json<Vec<DamageReport>>> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            DamageStatus::parse(s).ok_or_else(|| AppError::Validation {
                field: "status".to_string(),
                message: format!("Unknown damage report status: {}", s),
            })
        })
        .transpose()?;

    let service = DamageReportService::new(state.db);
    let reports = service.list(user.warehouse_id, status).await?;
    Ok(Json(reports))
}

pub async fn get_damage_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<DamageReport>> {
    let service = DamageReportService::new(state.db);
    let report = service.get(user.warehouse_id, report_id).await?;
    Ok(Json(report))
}

pub async fn approve_damage_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<DamageReport>> {
    let service = DamageReportService::new(state.db);
    let report = service
        .approve(user.warehouse_id, user.user_id, report_id)
        .await?;
    Ok(Json(report))
}

pub async fn reject_damage_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<DamageReport>> {
    let service = DamageReportService::new(state.db);
    let report = service
        .reject(user.warehouse_id, user.user_id, report_id)
        .await?;
    Ok(Json(report))
}
