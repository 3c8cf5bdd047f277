use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;

use tracker_core::models::activity::ActivityFilter;
use tracker_core::models::saved_view::{NewSavedView, SavedView};
use tracker_core::reporting::DashboardSummary;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::handlers::{file_response, XLSX_CONTENT_TYPE};
use crate::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.service.dashboard(&caller, &filter).await?))
}

pub async fn list_views(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<SavedView>>, ApiError> {
    Ok(Json(state.service.list_dashboard_views(&caller).await?))
}

pub async fn save_view(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(body): Json<NewSavedView>,
) -> Result<Json<SavedView>, ApiError> {
    Ok(Json(state.service.save_dashboard_view(&caller, &body).await?))
}

pub async fn get_view(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> Result<Json<SavedView>, ApiError> {
    Ok(Json(state.service.get_dashboard_view(&caller, id).await?))
}

pub async fn delete_view(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_dashboard_view(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn view_dashboard(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<i64>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.service.saved_dashboard(&caller, id).await?))
}

pub async fn export(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(filter): Query<ActivityFilter>,
) -> Result<Response, ApiError> {
    let file = state.service.export_activities(&caller, &filter).await?;
    Ok(file_response(XLSX_CONTENT_TYPE, &file.file_name, file.bytes))
}
