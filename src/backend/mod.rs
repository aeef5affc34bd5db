use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::debug;

use crate::availability::HealthProbe;

pub const RUNNING_MARKER: &str = "Backend is running";

/// Multipart payload sent to `/process_receipt`.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub upload_to_notion: bool,
    pub bearer: Option<String>,
}

/// Raw reply from the backend; interpretation is left to the caller.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub status: StatusCode,
    pub body: String,
}

/// Thin HTTP client for the OCR backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("receipt-ocr-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn process_receipt(&self, upload: ReceiptUpload) -> Result<BackendReply, reqwest::Error> {
        let length = upload.bytes.len() as u64;
        let image = Part::stream_with_length(upload.bytes, length)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = Form::new()
            .part("receipt_image", image)
            .text("upload_to_notion", upload.upload_to_notion.to_string());

        let mut request = self
            .http
            .post(format!("{}/process_receipt", self.base_url))
            .multipart(form);
        if let Some(token) = upload.bearer.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "process_receipt replied");

        Ok(BackendReply { status, body })
    }

    /// `true` once `/status` answers with the running marker.
    pub async fn is_running(&self) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .context("status request failed")?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let body = response
            .text()
            .await
            .context("failed to read status body")?;
        Ok(is_running_payload(&body))
    }
}

impl HealthProbe for BackendClient {
    async fn probe(&self) -> Result<bool> {
        self.is_running().await
    }
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    message: Option<String>,
}

fn is_running_payload(body: &str) -> bool {
    serde_json::from_str::<StatusPayload>(body)
        .ok()
        .and_then(|payload| payload.message)
        .is_some_and(|message| message == RUNNING_MARKER)
}
