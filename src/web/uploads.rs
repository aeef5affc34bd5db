use axum::extract::Multipart;

use crate::intake::{CandidateFile, IntakeLimits, ValidationError};

pub const RECEIPT_FIELD: &str = "receipt_image";

/// Error returned when reading the receipt field from a multipart form.
#[derive(Debug)]
pub enum UploadError {
    Form(String),
    MissingFile,
    Invalid(ValidationError),
}

impl UploadError {
    pub fn message(&self) -> String {
        match self {
            UploadError::Form(message) => message.clone(),
            UploadError::MissingFile => "No receipt image was uploaded.".to_string(),
            UploadError::Invalid(err) => err.user_message(),
        }
    }
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError::Invalid(err)
    }
}

/// Pull the receipt file out of the form, enforcing the byte limit while the
/// body streams in so oversized uploads are never fully buffered.
pub async fn read_candidate(
    mut multipart: Multipart,
    limits: &IntakeLimits,
) -> Result<CandidateFile, UploadError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Form(format!("Failed to read the upload form: {err}")))?
    {
        if field.name() != Some(RECEIPT_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("receipt").to_string();
        let content_type = field.content_type().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::Form(format!("Failed to read upload data: {err}")))?
        {
            limits.check_size((bytes.len() + chunk.len()) as u64)?;
            bytes.extend_from_slice(&chunk);
        }

        return Ok(CandidateFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(UploadError::MissingFile)
}
