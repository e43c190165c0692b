use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::resume::poller::PollError;
use crate::resume::validation::ResumeFile;

pub const GENERIC_UPLOAD_FAILURE: &str = "Upload failed. Please try again.";

/// Opaque identifier of a server-side analysis job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub resume_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UploadError {
    pub message: String,
}

impl UploadError {
    pub fn generic() -> Self {
        Self {
            message: GENERIC_UPLOAD_FAILURE.to_string(),
        }
    }
}

/// One status-endpoint response. `status` stays a raw string so unknown
/// values can be told apart from a transport failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    #[serde(default)]
    pub analysis_results: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// The remote side of the upload-and-poll workflow.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Single upload attempt; never retried.
    async fn upload(&self, file: &ResumeFile) -> Result<JobHandle, UploadError>;

    async fn fetch_status(&self, handle: &JobHandle) -> Result<StatusPayload, PollError>;
}

#[derive(Debug, Serialize)]
pub struct UploadRequestBody<'a> {
    pub file_content_base64: String,
    pub file_name: &'a str,
    pub content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadAccepted {
    resume_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
    error: Option<String>,
}

/// HTTP implementation against `<upload_base>/upload-resume` and
/// `<status_base>/api/resume-status/:resume_id`.
#[derive(Clone)]
pub struct HttpAnalysisApi {
    client: Client,
    upload_base: String,
    status_base: String,
}

impl HttpAnalysisApi {
    pub fn new(upload_base: &str, status_base: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            upload_base: upload_base.trim_end_matches('/').to_string(),
            status_base: status_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn upload(&self, file: &ResumeFile) -> Result<JobHandle, UploadError> {
        let body = UploadRequestBody {
            file_content_base64: general_purpose::STANDARD.encode(&file.bytes),
            file_name: &file.name,
            content_type: &file.content_type,
        };

        let response = self
            .client
            .post(format!("{}/upload-resume", self.upload_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Resume upload request failed: {e}");
                UploadError::generic()
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<MessageBody>()
                .await
                .ok()
                .and_then(|b| b.message.or(b.error));
            warn!("Resume upload rejected with {status}: {message:?}");
            return Err(message
                .map(|message| UploadError { message })
                .unwrap_or_else(UploadError::generic));
        }

        let accepted: UploadAccepted = response.json().await.map_err(|e| {
            warn!("Resume upload returned an unreadable body: {e}");
            UploadError::generic()
        })?;
        debug!("Resume uploaded as {}", accepted.resume_id);

        Ok(JobHandle {
            resume_id: accepted.resume_id,
        })
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<StatusPayload, PollError> {
        let response = self
            .client
            .get(format!(
                "{}/api/resume-status/{}",
                self.status_base, handle.resume_id
            ))
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<MessageBody>()
                .await
                .ok()
                .and_then(|b| b.error.or(b.message))
                .unwrap_or_else(|| status.to_string());
            return Err(PollError::Transport(detail));
        }

        response
            .json::<StatusPayload>()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use bytes::Bytes;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn start_mock_server(app: Router) -> (String, oneshot::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });
        (base_url, shutdown_tx)
    }

    fn resume() -> ResumeFile {
        ResumeFile::new("cv.txt", "text/plain", Bytes::from_static(b"Team lead, 5 years"))
    }

    #[tokio::test]
    async fn test_upload_sends_base64_body_and_returns_handle() {
        let app = Router::new().route(
            "/upload-resume",
            post(|Json(body): Json<Value>| async move {
                let decoded = general_purpose::STANDARD
                    .decode(body["file_content_base64"].as_str().unwrap())
                    .unwrap();
                assert_eq!(decoded, b"Team lead, 5 years");
                assert_eq!(body["file_name"], "cv.txt");
                assert_eq!(body["content_type"], "text/plain");
                Json(json!({"resume_id": "r-123", "status": "processing"}))
            }),
        );
        let (base, shutdown) = start_mock_server(app).await;

        let api = HttpAnalysisApi::new(&base, &base).unwrap();
        let handle = api.upload(&resume()).await.unwrap();

        assert_eq!(handle.resume_id, "r-123");
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_upload_surfaces_server_message() {
        let app = Router::new().route(
            "/upload-resume",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"message": "No file content provided."})),
                )
                    .into_response()
            }),
        );
        let (base, shutdown) = start_mock_server(app).await;

        let api = HttpAnalysisApi::new(&base, &base).unwrap();
        let err = api.upload(&resume()).await.unwrap_err();

        assert_eq!(err.message, "No file content provided.");
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_upload_falls_back_to_generic_message() {
        let app = Router::new().route(
            "/upload-resume",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down").into_response() }),
        );
        let (base, shutdown) = start_mock_server(app).await;

        let api = HttpAnalysisApi::new(&base, &base).unwrap();
        let err = api.upload(&resume()).await.unwrap_err();

        assert_eq!(err, UploadError::generic());
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_upload_network_failure_is_typed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let api = HttpAnalysisApi::new(&base, &base).unwrap();
        let err = api.upload(&resume()).await.unwrap_err();

        assert_eq!(err, UploadError::generic());
    }

    #[tokio::test]
    async fn test_fetch_status_parses_payload() {
        let app = Router::new().route(
            "/api/resume-status/:resume_id",
            get(|Path(resume_id): Path<String>| async move {
                assert_eq!(resume_id, "r-9");
                Json(json!({"status": "failed", "error_message": "corrupt file"}))
            }),
        );
        let (base, shutdown) = start_mock_server(app).await;

        let api = HttpAnalysisApi::new("http://unused", &format!("{base}/")).unwrap();
        let payload = api
            .fetch_status(&JobHandle {
                resume_id: "r-9".into(),
            })
            .await
            .unwrap();

        assert_eq!(payload.status, "failed");
        assert_eq!(payload.error_message.as_deref(), Some("corrupt file"));
        assert!(payload.analysis_results.is_none());
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_fetch_status_not_found_is_transport_error() {
        let app = Router::new().route(
            "/api/resume-status/:resume_id",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": "Resume ID not found."})),
                )
                    .into_response()
            }),
        );
        let (base, shutdown) = start_mock_server(app).await;

        let api = HttpAnalysisApi::new(&base, &base).unwrap();
        let err = api
            .fetch_status(&JobHandle {
                resume_id: "missing".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err, PollError::Transport("Resume ID not found.".into()));
        shutdown.send(()).ok();
    }
}
