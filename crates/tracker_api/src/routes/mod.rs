use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{activities, attachments, health_check, masters, reports, uploads};
use crate::AppState;

/// Room for multipart framing around the largest accepted file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn app_router(state: AppState) -> Router {
    let settings = &state.service.settings;
    let body_limit = settings
        .max_upload_bytes
        .max(settings.attachment_policy.max_bytes)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/masters/:kind", get(masters::list).post(masters::create))
        .route("/api/masters/:kind/:id/deactivate", post(masters::deactivate))
        .route("/api/activities", get(activities::list).post(activities::create))
        .route("/api/activities/:id", get(activities::get).put(activities::update))
        .route("/api/activities/:id/status", post(activities::change_status))
        .route("/api/activities/:id/retire", post(activities::retire))
        .route("/api/activities/:id/audit", get(activities::audit_trail))
        .route("/api/activities/:id/attachments", get(attachments::list).post(attachments::upload))
        .route("/api/activities/:id/attachments/versions", get(attachments::versions))
        .route("/api/attachments/:id", delete(attachments::remove))
        .route("/api/attachments/:id/download", get(attachments::download))
        .route("/api/uploads", post(uploads::bulk_upload))
        .route("/api/uploads/template", get(uploads::template))
        .route("/api/uploads/:batch_id", get(uploads::batch_report))
        .route("/api/dashboard", get(reports::dashboard))
        .route("/api/dashboard/views", get(reports::list_views).post(reports::save_view))
        .route("/api/dashboard/views/:id", get(reports::get_view).delete(reports::delete_view))
        .route("/api/dashboard/views/:id/summary", get(reports::view_dashboard))
        .route("/api/export", get(reports::export))
        .layer(DefaultBodyLimit::max(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .with_state(state)
}
