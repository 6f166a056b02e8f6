pub mod error;
pub mod models;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use vget_core::JobEngine;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub engine: JobEngine,
}

impl AppState {
    pub fn new(engine: JobEngine) -> Self {
        Self { engine }
    }
}

/// All routes plus static serving of the artifacts directory.
pub fn router(state: AppState) -> Router {
    let media_dir = state.engine.media_dir().clone();
    Router::new()
        .route("/jobs", post(routes::submit_job).get(routes::find_job))
        .route("/jobs/{job_id}", get(routes::get_job))
        .route("/health", get(routes::health))
        .nest_service("/media", ServeDir::new(media_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
