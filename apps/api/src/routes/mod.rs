pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::schedule::handlers;
use crate::state::AppState;

/// Notice photos from phones routinely exceed axum's 2 MB default.
const EXTRACT_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/exam-schedules",
            get(handlers::handle_list_schedules),
        )
        .route(
            "/api/v1/exam-schedules/open",
            get(handlers::handle_open_schedules),
        )
        .route(
            "/api/v1/exam-schedules/:id",
            get(handlers::handle_get_schedule),
        )
        .route(
            "/api/v1/exam-schedules/extract",
            post(handlers::handle_extract).layer(DefaultBodyLimit::max(EXTRACT_BODY_LIMIT)),
        )
        .route(
            "/api/v1/exam-schedules/smart-crawl",
            post(handlers::handle_smart_crawl),
        )
        .route(
            "/api/v1/exam-schedules/bulk-save",
            post(handlers::handle_bulk_save),
        )
        .with_state(state)
}
