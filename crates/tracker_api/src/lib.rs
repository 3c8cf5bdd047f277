pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

use tracker_service::TrackerService;

#[derive(Clone)]
pub struct AppState {
    pub service: TrackerService,
}

impl AppState {
    pub fn new(service: TrackerService) -> Self {
        Self { service }
    }
}
