use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracker_service::Error;

/// A service error on its way out as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::Spreadsheet(_) | Error::FileConstraint(_) => StatusCode::BAD_REQUEST,
        Error::ReferentialIntegrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        Error::Permission(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::AllocationConflict(_) | Error::Database(_) | Error::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Message safe to show the caller. Internal failures are logged and
/// replaced with a generic text.
pub fn public_message(status: StatusCode, err: &Error) -> String {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {:?}", err);
        "Internal server error".to_string()
    } else {
        err.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = public_message(status, &self.0);
        (status, Json(json!({ "error": message }))).into_response()
    }
}
