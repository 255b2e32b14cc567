mod health;
mod metrics;
mod upload;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::healthcheck;
pub use metrics::metrics_handler;
pub use upload::{upload_file, UploadResponse};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/upload", post(upload_file))
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
}
