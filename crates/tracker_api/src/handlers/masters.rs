use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracker_core::models::master_data::{MasterEntry, MasterKind, NewMasterEntry};
use tracker_service::Error;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

fn parse_kind(raw: &str) -> Result<MasterKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(Error::NotFound(format!("master data kind '{}'", raw))))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<MasterEntry>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let entries = state.service.list_masters(&caller, kind, params.include_inactive).await?;
    Ok(Json(entries))
}

pub async fn create(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(kind): Path<String>,
    Json(body): Json<CreateBody>,
) -> Result<(StatusCode, Json<MasterEntry>), ApiError> {
    let new = NewMasterEntry {
        kind: parse_kind(&kind)?,
        code: body.code,
        name: body.name,
        is_default: body.is_default,
    };
    let entry = state.service.create_master(&caller, &new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<MasterEntry>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.service.deactivate_master(&caller, kind, id).await?))
}
