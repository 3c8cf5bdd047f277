use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracker_core::models::activity::{ActivityFilter, ActivityUpdate, ActivityView};
use tracker_core::models::audit::AuditEntry;
use tracker_service::activities::ActivityInput;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub async fn list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<ActivityView>>, ApiError> {
    Ok(Json(state.service.list_activities(&caller, &filter).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(input): Json<ActivityInput>,
) -> Result<(StatusCode, Json<ActivityView>), ApiError> {
    let view = state.service.create_activity(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ActivityView>, ApiError> {
    Ok(Json(state.service.get_activity(&caller, &id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(update): Json<ActivityUpdate>,
) -> Result<Json<ActivityView>, ApiError> {
    Ok(Json(state.service.update_activity(&caller, &id, &update).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ActivityView>, ApiError> {
    Ok(Json(state.service.change_status(&caller, &id, &body.status).await?))
}

pub async fn retire(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.retire_activity(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn audit_trail(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    Ok(Json(state.service.audit_trail(&caller, &id).await?))
}
