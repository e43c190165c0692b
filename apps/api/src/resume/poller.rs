//! Status polling for an uploaded resume.
//!
//! The loop is a small state machine: each response is interpreted into a
//! `PollOutcome`, and only `Processing` keeps the machine running. Waiting uses
//! tokio's timer, so tests drive it with a paused clock.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::resume::{AnalysisResult, AnalysisStatus};
use crate::resume::client::{AnalysisApi, JobHandle, StatusPayload};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// 30 attempts at 10 s each: a five minute ceiling.
pub const MAX_POLL_ATTEMPTS: u32 = 30;

pub const GENERIC_ANALYSIS_FAILURE: &str = "Analysis failed. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The attempt cap ran out, or the service answered with an unknown status.
    #[error("Analysis is taking longer than expected ({attempts} status checks). Please try again.")]
    TimedOut { attempts: u32 },

    /// The service explicitly reported `failed`.
    #[error("{0}")]
    AnalysisFailed(String),

    #[error("Could not check analysis status: {0}")]
    Transport(String),

    #[error("Analysis was cancelled")]
    Cancelled,
}

/// Feedback emitted after every `processing` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollProgress {
    pub attempts: u32,
    pub progress: u8,
    pub message: &'static str,
}

/// Synthetic progress while processing: `min(50 + attempts * 2, 90)`.
pub fn progress_for(attempts: u32) -> u8 {
    50u32.saturating_add(attempts.saturating_mul(2)).min(90) as u8
}

pub fn status_message(attempts: u32) -> &'static str {
    match attempts {
        0..=4 => "Extracting text from your resume...",
        5..=14 => "Our AI is analyzing your skills and experience...",
        _ => "Almost there! Finalizing your tech compatibility report...",
    }
}

#[derive(Debug, PartialEq)]
enum PollOutcome {
    Processing,
    Completed(AnalysisResult),
    Failed(String),
    Unrecognized(String),
}

fn interpret(payload: StatusPayload) -> PollOutcome {
    match payload.status.parse::<AnalysisStatus>() {
        Ok(AnalysisStatus::Processing) => PollOutcome::Processing,
        Ok(AnalysisStatus::Completed) => {
            match payload
                .analysis_results
                .map(serde_json::from_value::<AnalysisResult>)
            {
                Some(Ok(result)) => PollOutcome::Completed(result),
                _ => PollOutcome::Failed("Analysis finished without a readable report".to_string()),
            }
        }
        Ok(AnalysisStatus::Failed) => PollOutcome::Failed(
            payload
                .error_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_ANALYSIS_FAILURE.to_string()),
        ),
        Err(_) => PollOutcome::Unrecognized(payload.status),
    }
}

/// Polls until the job reaches a terminal state, the attempt cap is exhausted,
/// or `cancel` fires. The first check happens immediately; later checks are
/// `config.interval` apart and strictly sequential.
pub async fn poll_status<A>(
    api: &A,
    handle: &JobHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_progress: impl FnMut(PollProgress) + Send,
) -> Result<AnalysisResult, PollError>
where
    A: AnalysisApi + ?Sized,
{
    let mut attempts = 0;

    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            payload = api.fetch_status(handle) => payload?,
        };
        attempts += 1;

        match interpret(payload) {
            PollOutcome::Processing => {
                on_progress(PollProgress {
                    attempts,
                    progress: progress_for(attempts),
                    message: status_message(attempts),
                });
                if attempts >= config.max_attempts {
                    warn!(
                        resume_id = %handle.resume_id,
                        "Analysis still processing after {attempts} checks, giving up"
                    );
                    return Err(PollError::TimedOut { attempts });
                }
                debug!(resume_id = %handle.resume_id, attempts, "Analysis still processing");
            }
            PollOutcome::Completed(result) => return Ok(result),
            PollOutcome::Failed(message) => return Err(PollError::AnalysisFailed(message)),
            PollOutcome::Unrecognized(status) => {
                warn!(resume_id = %handle.resume_id, "Unrecognized analysis status '{status}'");
                return Err(PollError::TimedOut { attempts });
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}
