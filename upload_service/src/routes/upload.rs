use crate::{
    error::{ApiError, ValidationError},
    server::SharedState,
    upload::{run_pipeline, validate_upload, UploadedFile},
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{instrument, Span};
use uuid::Uuid;

const SUCCESS_MESSAGE: &str = "Prediction successful";

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub result: f32,
    pub message: &'static str,
}

#[instrument(skip_all, fields(request_id = tracing::field::Empty))]
pub async fn upload_file(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    Span::current().record("request_id", tracing::field::display(request_id));

    let response = predict_upload(&state, request_id, multipart).await;
    state.metrics.record_upload(match &response {
        Ok(_) => "success",
        Err(e) => e.outcome(),
    });

    response.map(Json)
}

async fn predict_upload(
    state: &SharedState,
    request_id: Uuid,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadResponse, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!("Request carries no multipart body: {}", rejection);
        ValidationError::NoFilePart
    })?;

    let upload = read_file_part(multipart).await?;
    let upload = validate_upload(upload, &state.upload_config.allowed_extensions)?;
    let model = state.model.get()?;
    tracing::info!(
        filename = %upload.filename,
        size = upload.bytes.len(),
        "Accepted upload"
    );

    let upload_dir = state.upload_config.upload_dir.clone();
    let preprocessor = state.preprocessor.clone();
    let span = Span::current();
    let started = Instant::now();

    let prediction = tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            run_pipeline(
                &upload_dir,
                request_id,
                &upload,
                &preprocessor,
                model.as_ref(),
            )
        })
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Prediction task failed: {}", e)))??;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    state.metrics.record_prediction_duration(elapsed_ms);

    let result = prediction.scalar()?;
    tracing::info!(elapsed_ms, "Prediction {}", result);

    Ok(UploadResponse {
        result,
        message: SUCCESS_MESSAGE,
    })
}

/// Reads every field so that an oversized body is always reported, keeping
/// the first `file` part that carries a filename.
async fn read_file_part(mut multipart: Multipart) -> Result<Option<UploadedFile>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if upload.is_some() || field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        upload = Some(UploadedFile { filename, bytes });
    }

    Ok(upload)
}
