use crate::{
    error::CheckerError,
    page::{self, Outcome, Preview},
    server::CheckerState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use bytes::Bytes;
use ocr_inference::{ModelService, PreprocessError, Prediction, Preprocessor};
use std::sync::Arc;
use tracing::instrument;

pub fn checker_routes() -> Router<CheckerState> {
    Router::new().route("/", get(index).post(check))
}

pub async fn index(State(state): State<CheckerState>) -> Html<String> {
    Html(page::render(&Outcome::Empty, &state.checker.allowed_extensions))
}

#[instrument(skip_all)]
pub async fn check(
    State(state): State<CheckerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Html<String>) {
    let outcome = run_check(&state, multipart).await;
    let status = match &outcome {
        Outcome::Failed { error, .. } => {
            tracing::warn!("Check failed: {}", error);
            error.status()
        }
        _ => StatusCode::OK,
    };

    (
        status,
        Html(page::render(&outcome, &state.checker.allowed_extensions)),
    )
}

async fn run_check(
    state: &CheckerState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Outcome {
    let (filename, bytes) = match read_image(state, multipart).await {
        Ok(image) => image,
        Err(error) => {
            return Outcome::Failed {
                preview: None,
                error,
            }
        }
    };
    tracing::info!(%filename, size = bytes.len(), "Checking image");

    let preview = match Preview::from_bytes(&bytes) {
        Ok(preview) => preview,
        Err(e) => {
            return Outcome::Failed {
                preview: None,
                error: CheckerError::from(PreprocessError::from(e)),
            }
        }
    };
    let preprocessor = state.preprocessor.clone();
    let model = state.model.get();
    let inference =
        tokio::task::spawn_blocking(move || predict(&preprocessor, model, &bytes)).await;

    match inference {
        Ok(Ok(prediction)) => Outcome::Predicted {
            preview,
            prediction,
        },
        Ok(Err(error @ CheckerError::Preprocess(_))) => Outcome::Failed {
            preview: None,
            error,
        },
        Ok(Err(error)) => Outcome::Failed {
            preview: Some(preview),
            error,
        },
        Err(e) => Outcome::Failed {
            preview: Some(preview),
            error: CheckerError::Internal(format!("Prediction task failed: {}", e)),
        },
    }
}

/// Decodes first, so an undecodable file is reported even while the model is
/// unavailable.
fn predict(
    preprocessor: &Preprocessor,
    model: Result<Arc<dyn ModelService>, ocr_inference::ModelError>,
    bytes: &[u8],
) -> Result<Prediction, CheckerError> {
    let tensor = preprocessor.preprocess(bytes)?;
    Ok(model?.predict(&tensor)?)
}

async fn read_image(
    state: &CheckerState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, Bytes), CheckerError> {
    let mut multipart = multipart.map_err(|_| CheckerError::NoFile)?;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        if image.is_some() || field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        image = Some((filename, field.bytes().await?));
    }

    let (filename, bytes) = image.ok_or(CheckerError::NoFile)?;
    if filename.is_empty() || bytes.is_empty() {
        return Err(CheckerError::NoFile);
    }
    if !state.checker.allows(&filename) {
        return Err(CheckerError::InvalidFileType);
    }
    Ok((filename, bytes))
}
