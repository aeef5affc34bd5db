use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Form, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    intake::{ValidationError, submit_candidate_file},
    presenter::DisplayModel,
    session::{CookieTokenStorage, SessionStore},
    submission::{self, ReceiptOutcome},
    web::{
        AppState, ApiMessage,
        flash::Notification,
        json_error,
        results::render_result,
        uploads::{UploadError, read_candidate},
        workspace::WorkspaceError,
    },
};

/// Multipart framing overhead allowed on top of the image byte limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

type ApiError = (StatusCode, Json<ApiMessage>);

pub fn router(max_image_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_image_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/api/workspaces/:id/images",
            post(accept_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/workspaces/:id/receipts", post(process_receipt))
        .route("/api/workspaces/:id/close", post(close_workspace))
        .route("/api/previews/:id", get(serve_preview))
}

#[derive(Serialize)]
struct AcceptedImage {
    preview_url: String,
    file_name: String,
    width: u32,
    height: u32,
    size: u64,
}

async fn accept_image(
    State(state): State<AppState>,
    Path(workspace): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<AcceptedImage>, ApiError> {
    if !state.workspaces().contains(workspace) {
        return Err(workspace_error(WorkspaceError::Unknown));
    }

    let limits = &state.config().intake;
    let candidate = read_candidate(multipart, limits)
        .await
        .map_err(upload_error)?;
    let asset = submit_candidate_file(candidate, limits)
        .await
        .map_err(|err| upload_error(UploadError::Invalid(err)))?;

    let accepted = AcceptedImage {
        preview_url: String::new(),
        file_name: asset.file_name.clone(),
        width: asset.width,
        height: asset.height,
        size: asset.size,
    };
    let preview_url = state
        .workspaces()
        .replace_asset(workspace, asset, state.previews())
        .map_err(workspace_error)?;

    info!(%workspace, file = %accepted.file_name, size = accepted.size, "receipt image accepted");
    Ok(Json(AcceptedImage {
        preview_url,
        ..accepted
    }))
}

#[derive(Deserialize)]
struct ReceiptForm {
    #[serde(default, deserialize_with = "checkbox")]
    upload_to_notion: bool,
}

fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    ))
}

#[derive(Serialize)]
struct ReceiptResponse {
    submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ReceiptOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_html: Option<String>,
    notion_uploaded: bool,
    notifications: Vec<Notification>,
}

async fn process_receipt(
    State(state): State<AppState>,
    Path(workspace): Path<Uuid>,
    jar: CookieJar,
    Form(form): Form<ReceiptForm>,
) -> Response {
    let guard = match state.workspaces().begin_submission(workspace) {
        Ok(guard) => guard,
        Err(err) => return workspace_error(err).into_response(),
    };

    let session = SessionStore::new(CookieTokenStorage::new(jar));
    let credentials = session.credentials(form.upload_to_notion);

    match submission::submit(
        state.backend(),
        guard.asset(),
        form.upload_to_notion,
        &credentials,
    )
    .await
    {
        Ok(None) => Json(ReceiptResponse {
            submitted: false,
            result: None,
            result_html: None,
            notion_uploaded: false,
            notifications: vec![Notification::info("Select a receipt image first.")],
        })
        .into_response(),
        Ok(Some(outcome)) => {
            let mut notifications = vec![Notification::success("Receipt processed successfully!")];
            if outcome.notion_uploaded {
                notifications.push(Notification::success("Items uploaded to Notion."));
            } else if form.upload_to_notion && !credentials.authenticated {
                notifications.push(Notification::info(
                    "Connect Notion to upload items. This receipt was processed without uploading.",
                ));
            }

            Json(ReceiptResponse {
                submitted: true,
                result_html: Some(render_result(&outcome.result)),
                notion_uploaded: outcome.notion_uploaded,
                result: Some(outcome),
                notifications,
            })
            .into_response()
        }
        Err(err) => {
            let message = err.user_message();
            (
                StatusCode::BAD_GATEWAY,
                Json(ReceiptResponse {
                    submitted: true,
                    result: None,
                    result_html: Some(render_result(&DisplayModel::Raw(message.clone()))),
                    notion_uploaded: false,
                    notifications: vec![Notification::error(message)],
                }),
            )
                .into_response()
        }
    }
}

async fn close_workspace(State(state): State<AppState>, Path(workspace): Path<Uuid>) -> StatusCode {
    state.workspaces().close(workspace);
    StatusCode::NO_CONTENT
}

async fn serve_preview(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.previews().get(id) {
        Some(preview) => (
            [
                (header::CONTENT_TYPE, preview.content_type),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            preview.bytes,
        )
            .into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Preview is no longer available.").into_response(),
    }
}

fn upload_error(err: UploadError) -> ApiError {
    let status = match &err {
        UploadError::Invalid(ValidationError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        UploadError::MissingFile | UploadError::Form(_) => StatusCode::BAD_REQUEST,
    };
    let kind = match &err {
        UploadError::Invalid(validation) => validation.kind(),
        UploadError::MissingFile => "missing_file",
        UploadError::Form(_) => "form",
    };
    if let UploadError::Form(message) = &err {
        error!(%message, "failed to read receipt upload");
    }
    (status, Json(ApiMessage::new(err.message()).with_kind(kind)))
}

fn workspace_error(err: WorkspaceError) -> ApiError {
    match err {
        WorkspaceError::Unknown => (
            StatusCode::NOT_FOUND,
            Json(
                ApiMessage::new("This page has expired. Reload to start again.")
                    .with_kind("unknown_workspace"),
            ),
        ),
        WorkspaceError::Busy => (
            StatusCode::CONFLICT,
            Json(
                ApiMessage::new("A receipt is already being processed.").with_kind("in_flight"),
            ),
        ),
    }
}
