use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use tracker_core::models::upload_batch::{BatchReport, UploadSummary};
use tracker_service::template::TEMPLATE_FILE_NAME;
use tracker_service::Error;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::handlers::attachments::invalid_body;
use crate::handlers::{file_response, XLSX_CONTENT_TYPE};
use crate::AppState;

/// Multipart fields: `file` and `planning_year`.
pub async fn bulk_upload(
    State(state): State<AppState>,
    Caller(caller): Caller,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut planning_year: Option<i32> = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(invalid_body)?;
                file = Some((filename, bytes.to_vec()));
            }
            "planning_year" => {
                let raw = field.text().await.map_err(invalid_body)?;
                let year = raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::Validation(format!("planning_year '{}' is not a year", raw.trim())))?;
                planning_year = Some(year);
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| Error::Validation("a file is required".into()))?;
    let planning_year = planning_year.ok_or_else(|| Error::Validation("planning_year is required".into()))?;
    let summary = state
        .service
        .bulk_upload(&caller, planning_year, &file_name, &bytes)
        .await?;
    Ok(Json(summary))
}

pub async fn template(State(state): State<AppState>, Caller(_caller): Caller) -> Result<Response, ApiError> {
    let bytes = state.service.upload_template().await?;
    Ok(file_response(XLSX_CONTENT_TYPE, TEMPLATE_FILE_NAME, bytes))
}

pub async fn batch_report(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchReport>, ApiError> {
    Ok(Json(state.service.batch_report(&caller, batch_id).await?))
}
