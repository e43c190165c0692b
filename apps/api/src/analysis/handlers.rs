use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::analysis::extract::extension_for;
use crate::analysis::processor::AnalysisJob;
use crate::analysis::store::StoreError;
use crate::errors::AppError;
use crate::models::resume::{AnalysisRecord, AnalysisStatus, StatusResponse};
use crate::resume::validation::{validate, ResumeFile, ValidationError, MAX_FILE_SIZE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub file_content_base64: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub resume_id: String,
    pub status: AnalysisStatus,
}

/// Upload failures carry a `{message}` body, which the upload client surfaces verbatim.
#[derive(Debug)]
pub struct UploadRejection {
    status: StatusCode,
    message: String,
}

impl UploadRejection {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

impl From<ValidationError> for UploadRejection {
    fn from(e: ValidationError) -> Self {
        let status = match e {
            ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ValidationError::UnsupportedType { .. } => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

/// POST /upload-resume
#[instrument(skip_all)]
pub async fn handle_upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, UploadRejection> {
    let Json(req) = payload.map_err(|e| {
        warn!("Rejected upload body: {e}");
        // The body limit sits above the encoded size of any acceptable file.
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return UploadRejection::from(ValidationError::TooLarge {
                size: MAX_FILE_SIZE + 1,
            });
        }
        UploadRejection::bad_request("Invalid JSON format in request body.")
    })?;

    let encoded = req
        .file_content_base64
        .filter(|c| !c.is_empty())
        .ok_or_else(|| UploadRejection::bad_request("No file content provided."))?;
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| UploadRejection::bad_request("File content is not valid base64."))?;

    let file = ResumeFile::new(
        req.file_name.unwrap_or_else(|| "resume_upload".to_string()),
        req.content_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        Bytes::from(bytes),
    );
    validate(&file)?;

    let resume_id = Uuid::new_v4().to_string();
    let extension = extension_for(&file.content_type, &file.name);
    let object_key = format!("{resume_id}.{extension}");

    state
        .objects
        .put(&object_key, file.bytes.clone(), &file.content_type)
        .await
        .map_err(|e| {
            error!("Failed to store resume {object_key}: {e}");
            UploadRejection::internal("Failed to store resume file.")
        })?;
    info!("Resume {object_key} stored ({} bytes)", file.size());

    if let Err(e) = state
        .store
        .create(&AnalysisRecord::processing(&resume_id, &object_key, &file.name))
        .await
    {
        error!("Failed to create analysis record for {resume_id}: {e}");
        if let Err(e) = state.objects.delete(&object_key).await {
            error!("Resume object {object_key} is orphaned: {e}");
        }
        return Err(UploadRejection::internal(
            "Failed to register resume for analysis.",
        ));
    }

    let job = AnalysisJob {
        resume_id: resume_id.clone(),
        object_key,
        extension: extension.to_string(),
    };
    if let Err(e) = state.analysis_queue.try_send(job) {
        let (reason, message) = match e {
            TrySendError::Full(_) => (
                "Analysis queue full",
                "Analysis service is busy. Please try again shortly.",
            ),
            TrySendError::Closed(_) => (
                "Analysis service unavailable",
                "Analysis service is temporarily unavailable.",
            ),
        };
        error!("{reason}; failing {resume_id}");
        if let Err(e) = state.store.mark_failed(&resume_id, reason).await {
            error!("Failed to mark {resume_id} as failed: {e}");
        }
        return Err(UploadRejection::unavailable(message));
    }
    info!("Resume {resume_id} queued for analysis");

    Ok(Json(UploadResponse {
        message: "Resume uploaded and queued for processing.".to_string(),
        resume_id,
        status: AnalysisStatus::Processing,
    }))
}

/// GET /api/resume-status/:resume_id
///
/// Terminal statuses are served from the status cache for its TTL; `processing`
/// is never cached so progress is always read from the store.
#[instrument(skip(state))]
pub async fn handle_resume_status(
    State(state): State<AppState>,
    Path(resume_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    if !is_plausible_resume_id(&resume_id) {
        return Err(AppError::Validation("Invalid resume ID.".to_string()));
    }

    if let Some(cached) = state.status_cache.get(&resume_id) {
        debug!("Serving cached status");
        return Ok(Json(cached));
    }

    let record = state
        .store
        .get(&resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume ID not found.".to_string()))?;

    let response = StatusResponse::try_from(record).map_err(|reason| StoreError::Corrupt {
        resume_id: resume_id.clone(),
        reason,
    })?;

    if response.status.is_terminal() {
        state.status_cache.set(resume_id, response.clone());
    }

    Ok(Json(response))
}

fn is_plausible_resume_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
