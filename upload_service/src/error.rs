use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ocr_inference::{ModelError, PreprocessError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("File exceeds the maximum upload size")]
    PayloadTooLarge,
    #[error("Malformed multipart request: {0}")]
    Multipart(String),
    #[error("Error processing image")]
    Preprocess(#[from] PreprocessError),
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("{0}")]
    Inference(String),
    #[error("{0}")]
    Internal(String),
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotLoaded => ApiError::ModelUnavailable,
            other => ApiError::Inference(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Multipart(err.body_text())
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Preprocess(_)
            | ApiError::ModelUnavailable
            | ApiError::Inference(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `outcome` attribute of the upload counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::Multipart(_) => "rejected",
            ApiError::PayloadTooLarge => "too_large",
            ApiError::Preprocess(_) => "preprocess_error",
            ApiError::ModelUnavailable => "model_unavailable",
            ApiError::Inference(_) => "inference_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Preprocess(e) => tracing::error!("Preprocessing error: {}", e),
            e if status.is_server_error() => tracing::error!("Error during processing: {}", e),
            e => tracing::info!("Rejected upload: {}", e),
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
