use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracker_core::access::Principal;

use crate::error::ApiError;
use crate::AppState;

pub const USER_HEADER: &str = "x-user";

/// The active user named by the `X-User` header.
pub struct Caller(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let principal = state.service.authenticate(username).await?;
        Ok(Caller(principal))
    }
}
