//! Upload-and-analyze workflow state machine.
//!
//! `idle → uploading → analyzing → {succeeded | failed}`. `failed` is reachable
//! from both `uploading` and `analyzing`; terminal states stay put until
//! `reset` or `retry`. Cancellation returns the workflow to `idle`.

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::resume::AnalysisResult;
use crate::resume::client::{AnalysisApi, UploadError};
use crate::resume::poller::{poll_status, PollConfig, PollError};
use crate::resume::validation::{validate, ResumeFile, ValidationError};

const UPLOADING_PROGRESS: u8 = 10;
const UPLOADED_PROGRESS: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Uploading,
    Analyzing,
    Succeeded,
    Failed,
}

impl WorkflowStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, WorkflowStatus::Uploading | WorkflowStatus::Analyzing)
    }
}

/// Snapshot of one upload job, published to subscribers on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadJob {
    pub file: Option<ResumeFile>,
    pub resume_id: Option<String>,
    pub status: WorkflowStatus,
    /// UI feedback only; never decreases while a run is in flight.
    pub progress: u8,
    pub status_message: String,
    pub analysis_result: Option<AnalysisResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Poll(PollError),

    #[error("No resume file selected")]
    NoFile,

    #[error("An analysis is already in progress")]
    Busy,

    #[error("Analysis was cancelled")]
    Cancelled,
}

impl From<PollError> for WorkflowError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::Cancelled => WorkflowError::Cancelled,
            other => WorkflowError::Poll(other),
        }
    }
}

pub struct ResumeAnalysisWorkflow<A> {
    api: A,
    poll: PollConfig,
    job: watch::Sender<UploadJob>,
}

impl<A: AnalysisApi> ResumeAnalysisWorkflow<A> {
    pub fn new(api: A) -> Self {
        Self::with_poll_config(api, PollConfig::default())
    }

    pub fn with_poll_config(api: A, poll: PollConfig) -> Self {
        let (job, _) = watch::channel(UploadJob::default());
        Self { api, poll, job }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadJob> {
        self.job.subscribe()
    }

    pub fn snapshot(&self) -> UploadJob {
        self.job.borrow().clone()
    }

    /// Selects a file for upload. Every selection path (picker, drag-and-drop,
    /// command line) goes through here, so the same rules always apply.
    pub fn select_file(&self, file: ResumeFile) -> Result<(), WorkflowError> {
        if self.job.borrow().status.is_running() {
            return Err(WorkflowError::Busy);
        }
        if let Err(e) = validate(&file) {
            self.job.send_modify(|job| job.error = Some(e.to_string()));
            return Err(e.into());
        }
        self.job.send_replace(UploadJob {
            file: Some(file),
            ..UploadJob::default()
        });
        Ok(())
    }

    /// Back to `idle` with nothing selected.
    pub fn reset(&self) {
        if self.job.borrow().status.is_running() {
            warn!("Resetting a workflow that is still running");
        }
        self.job.send_replace(UploadJob::default());
    }

    /// Restarts the full flow for the selected file after a failure.
    pub async fn retry(&self, cancel: &CancellationToken) -> Result<AnalysisResult, WorkflowError> {
        if self.job.borrow().status.is_running() {
            return Err(WorkflowError::Busy);
        }
        self.back_to_idle();
        self.run(cancel).await
    }

    /// Uploads the selected file and polls until a terminal state.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<AnalysisResult, WorkflowError> {
        let file = {
            let job = self.job.borrow();
            if job.status != WorkflowStatus::Idle {
                return Err(WorkflowError::Busy);
            }
            job.file.clone().ok_or(WorkflowError::NoFile)?
        };

        if let Err(e) = validate(&file) {
            self.fail(e.to_string());
            return Err(e.into());
        }

        self.job.send_modify(|job| {
            job.status = WorkflowStatus::Uploading;
            job.progress = UPLOADING_PROGRESS;
            job.status_message = "Uploading your resume...".to_string();
            job.error = None;
        });

        let upload = tokio::select! {
            _ = cancel.cancelled() => {
                self.back_to_idle();
                return Err(WorkflowError::Cancelled);
            }
            upload = self.api.upload(&file) => upload,
        };
        let handle = match upload {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Resume upload failed: {e}");
                self.fail(e.to_string());
                return Err(e.into());
            }
        };
        info!(resume_id = %handle.resume_id, "Resume uploaded, waiting for analysis");

        self.job.send_modify(|job| {
            job.status = WorkflowStatus::Analyzing;
            job.resume_id = Some(handle.resume_id.clone());
            job.progress = job.progress.max(UPLOADED_PROGRESS);
            job.status_message = "Resume received. Starting analysis...".to_string();
        });

        let outcome = poll_status(&self.api, &handle, &self.poll, cancel, |p| {
            self.job.send_modify(|job| {
                job.progress = job.progress.max(p.progress);
                job.status_message = p.message.to_string();
            })
        })
        .await;

        match outcome {
            Ok(result) => {
                self.job.send_modify(|job| {
                    job.status = WorkflowStatus::Succeeded;
                    job.progress = 100;
                    job.status_message = "Analysis complete!".to_string();
                    job.analysis_result = Some(result.clone());
                });
                Ok(result)
            }
            Err(PollError::Cancelled) => {
                self.back_to_idle();
                Err(WorkflowError::Cancelled)
            }
            Err(e) => {
                warn!(resume_id = %handle.resume_id, "Resume analysis did not complete: {e}");
                self.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    fn fail(&self, message: String) {
        self.job.send_modify(|job| {
            job.status = WorkflowStatus::Failed;
            job.error = Some(message);
        });
    }

    /// Keeps the selected file, drops everything produced by the last run.
    fn back_to_idle(&self) {
        self.job.send_modify(|job| {
            let file = job.file.take();
            *job = UploadJob {
                file,
                ..UploadJob::default()
            };
        });
    }
}
