pub mod activities;
pub mod attachments;
pub mod masters;
pub mod reports;
pub mod uploads;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

pub async fn health_check() -> &'static str {
    "ok"
}

pub(crate) const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A file body with a download name.
pub(crate) fn file_response(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace(['"', '\\'], "_"));
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response()
}
