use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    backend::{BackendClient, BackendReply, ReceiptUpload},
    intake::ImageAsset,
    presenter::{self, DisplayModel},
    session::UploadCredentials,
};

pub const GENERIC_FAILURE: &str = "Failed to process the receipt.";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("could not reach the receipt backend: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

impl SubmissionError {
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Network(_) => {
                "Could not reach the receipt service. Please try again later.".to_string()
            }
            SubmissionError::Rejected(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptOutcome {
    pub result: DisplayModel,
    /// Set only when the upload was requested and the session was authenticated.
    pub notion_uploaded: bool,
}

/// Build the backend request for an asset. The bearer token is attached only
/// when an upload was requested and the session holds one.
pub fn prepare_upload(
    asset: &ImageAsset,
    want_notion_upload: bool,
    credentials: &UploadCredentials,
) -> ReceiptUpload {
    let bearer = if want_notion_upload && credentials.authenticated {
        credentials.bearer.clone()
    } else {
        None
    };

    let mut file_name = sanitize_filename::sanitize(&asset.file_name);
    if file_name.is_empty() {
        file_name = "receipt".to_string();
    }

    ReceiptUpload {
        file_name,
        content_type: asset.content_type.clone(),
        bytes: asset.bytes.clone(),
        upload_to_notion: want_notion_upload,
        bearer,
    }
}

/// Send one receipt to the backend. No asset means nothing to do.
pub async fn submit(
    backend: &BackendClient,
    asset: Option<&ImageAsset>,
    want_notion_upload: bool,
    credentials: &UploadCredentials,
) -> Result<Option<ReceiptOutcome>, SubmissionError> {
    let Some(asset) = asset else {
        return Ok(None);
    };

    let upload = prepare_upload(asset, want_notion_upload, credentials);
    let authenticated_upload = upload.bearer.is_some();
    info!(
        file = %upload.file_name,
        size = asset.size,
        want_notion_upload,
        authenticated_upload,
        "submitting receipt"
    );

    let reply = backend.process_receipt(upload).await.map_err(|err| {
        warn!(?err, "receipt submission failed to reach backend");
        SubmissionError::from(err)
    })?;

    interpret_reply(reply, want_notion_upload && credentials.authenticated).map(Some)
}

fn interpret_reply(reply: BackendReply, upload_leg: bool) -> Result<ReceiptOutcome, SubmissionError> {
    let body: Option<Value> = serde_json::from_str(&reply.body).ok();

    if !reply.status.is_success() {
        let message = body
            .as_ref()
            .and_then(|value| value.get("error"))
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(GENERIC_FAILURE)
            .to_string();
        warn!(status = %reply.status, %message, "backend rejected receipt");
        return Err(SubmissionError::Rejected(message));
    }

    let result = match body.as_ref().and_then(|value| value.get("items")) {
        Some(items) => presenter::render_value(items),
        None => presenter::render(&reply.body),
    };

    Ok(ReceiptOutcome {
        result,
        notion_uploaded: upload_leg,
    })
}
