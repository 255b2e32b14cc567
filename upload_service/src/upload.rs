use crate::error::{ApiError, ValidationError};
use bytes::Bytes;
use ocr_inference::{ModelService, Prediction, Preprocessor};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Longest file name component accepted by common filesystems.
const MAX_FILE_NAME_BYTES: usize = 255;

/// File part of a multipart upload, alive for one request only.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| {
            allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}

pub fn validate_upload(
    upload: Option<UploadedFile>,
    allowed_extensions: &[String],
) -> Result<UploadedFile, ValidationError> {
    let upload = upload.ok_or(ValidationError::NoFilePart)?;
    if upload.filename.is_empty() {
        return Err(ValidationError::NoSelectedFile);
    }
    if !allowed_file(&upload.filename, allowed_extensions) {
        return Err(ValidationError::InvalidFileType);
    }
    Ok(upload)
}

/// Reduces a client supplied filename to `[A-Za-z0-9_.-]`, flattening any
/// directory components so the result can never escape the upload directory.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Shortens a sanitized (ASCII) name to at most `max_len` bytes, cutting
/// the stem and keeping the extension whenever the extension fits.
fn truncate_filename(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && extension.len() + 1 < max_len => {
            let stem_len = max_len - extension.len() - 1;
            format!("{}.{}", &stem[..stem_len], extension)
        }
        _ => name[..max_len].to_string(),
    }
}

/// Upload persisted under `<upload_dir>/<request id>-<sanitized name>`.
/// The file is deleted by [`TempUpload::remove`] or, on any other exit path,
/// when the value is dropped.
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    pub fn persist(
        upload_dir: &Path,
        request_id: Uuid,
        upload: &UploadedFile,
    ) -> std::io::Result<Self> {
        let prefix = request_id.to_string();
        let sanitized = truncate_filename(
            &secure_filename(&upload.filename),
            MAX_FILE_NAME_BYTES - prefix.len() - 1,
        );
        let suffix = if sanitized.is_empty() {
            String::new()
        } else {
            format!("-{}", sanitized)
        };

        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .rand_bytes(0)
            .tempfile_in(upload_dir)?;
        file.write_all(&upload.bytes)?;
        file.flush()?;

        tracing::debug!("Saved upload to {:?}", file.path());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn remove(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            tracing::warn!("Failed to remove upload {:?}: {}", path, e);
        }
    }
}

/// Persists the upload, preprocesses it from disk and runs the model.
/// Blocking; the temp file is gone once this returns or unwinds.
pub fn run_pipeline(
    upload_dir: &Path,
    request_id: Uuid,
    upload: &UploadedFile,
    preprocessor: &Preprocessor,
    model: &dyn ModelService,
) -> Result<Prediction, ApiError> {
    let temp = TempUpload::persist(upload_dir, request_id, upload)
        .map_err(|e| ApiError::Internal(format!("Failed to save upload: {}", e)))?;

    let outcome = preprocessor
        .preprocess_file(temp.path())
        .map_err(ApiError::from)
        .and_then(|tensor| model.predict(&tensor).map_err(ApiError::from));

    temp.remove();
    outcome
}
