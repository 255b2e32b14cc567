use crate::{error::ApiError, server::SharedState};
use axum::extract::State;
use prometheus::{Encoder, TextEncoder};

pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, ApiError> {
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| ApiError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
