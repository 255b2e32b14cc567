use axum::{extract::multipart::MultipartError, http::StatusCode};
use ocr_inference::{ModelError, PreprocessError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("Choose an image to check")]
    NoFile,
    #[error("Unsupported file type, choose a png, jpg or jpeg image")]
    InvalidFileType,
    #[error("Could not read the upload: {}", .0.body_text())]
    Multipart(#[from] MultipartError),
    #[error("Could not open the image: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{0}")]
    Internal(String),
}

impl CheckerError {
    pub fn status(&self) -> StatusCode {
        match self {
            CheckerError::NoFile | CheckerError::InvalidFileType => StatusCode::BAD_REQUEST,
            CheckerError::Multipart(e) => e.status(),
            CheckerError::Preprocess(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CheckerError::Model(_) | CheckerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
