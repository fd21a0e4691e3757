pub mod batch_id;
pub mod metrics;
pub mod pipeline;
pub mod runner;

pub use batch_id::generate_batch_id;
pub use metrics::{PipelineMetrics, RunFailure, RunStage};
pub use pipeline::{BatchOutput, Pipeline};
pub use runner::{BatchRunner, DEFAULT_SOURCE};

use crate::api::models::ApiResponse;
use axum::{Json, http::StatusCode, response::IntoResponse};
use tracing::error;

/// Maps a failed storage call to an HTTP response.
pub struct AppError(pub common::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = StatusCode::INTERNAL_SERVER_ERROR;
        error!(status = %status_code, error = %self.0, "Request failed");

        let body = Json(ApiResponse::<()>::error(self.0.to_string()));
        (status_code, body).into_response()
    }
}

impl From<common::Error> for AppError {
    fn from(err: common::Error) -> Self {
        AppError(err)
    }
}
