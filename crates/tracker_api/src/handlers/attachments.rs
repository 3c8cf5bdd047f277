use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use tracker_core::models::attachment::{Attachment, AttachmentGroup, DocumentType};
use tracker_service::attachments::AttachmentUpload;
use tracker_service::Error;

use crate::auth::Caller;
use crate::error::{public_message, status_for, ApiError};
use crate::handlers::file_response;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VersionParams {
    #[serde(rename = "type")]
    pub document_type: String,
}

fn parse_document_type(raw: &str) -> Result<DocumentType, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Validation(format!("unknown document type '{}'", raw)))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<AttachmentGroup>>, ApiError> {
    Ok(Json(state.service.list_attachments(&caller, &id).await?))
}

pub async fn versions(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(params): Query<VersionParams>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    let document_type = parse_document_type(&params.document_type)?;
    Ok(Json(state.service.attachment_history(&caller, &id, document_type).await?))
}

/// Multipart fields: `file`, `document_type`, `description`. Answers with
/// `{success, message}` or `{success: false, error}`.
pub async fn upload(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let result = async {
        let upload = read_upload(id, multipart).await?;
        state.service.upload_attachment(&caller, upload).await
    }
    .await;

    match result {
        Ok(attachment) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": format!("{} uploaded as version {}", attachment.filename, attachment.version),
                "attachment": attachment,
            })),
        )
            .into_response(),
        Err(err) => {
            let status = status_for(&err);
            let message = public_message(status, &err);
            (status, Json(json!({ "success": false, "error": message }))).into_response()
        }
    }
}

async fn read_upload(activity_id: String, mut multipart: Multipart) -> Result<AttachmentUpload, Error> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut document_type = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(invalid_body)?;
                file = Some((filename, bytes.to_vec()));
            }
            "document_type" => {
                document_type = Some(parse_document_type(&field.text().await.map_err(invalid_body)?)?);
            }
            "description" => description = Some(field.text().await.map_err(invalid_body)?),
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| Error::Validation("a file is required".into()))?;
    let document_type = document_type.ok_or_else(|| Error::Validation("document_type is required".into()))?;
    Ok(AttachmentUpload {
        activity_id,
        document_type,
        filename,
        description,
        bytes,
    })
}

pub(crate) fn invalid_body(err: axum::extract::multipart::MultipartError) -> Error {
    Error::Validation(format!("invalid multipart body: {}", err.body_text()))
}

pub async fn remove(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Attachment>, ApiError> {
    Ok(Json(state.service.delete_attachment(&caller, id).await?))
}

pub async fn download(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (attachment, bytes) = state.service.download_attachment(&caller, id).await?;
    Ok(file_response(attachment.file_type.content_type(), &attachment.filename, bytes))
}
