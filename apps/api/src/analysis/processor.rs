//! Background analysis worker.
//!
//! Consumes queued jobs one at a time: fetch the stored file, extract and focus
//! its text, ask the model for a compatibility report, and record the outcome.
//! A failing job marks its record `failed`; it never stops the worker.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::analysis::extract::{extract_text, focus_key_sections, ExtractError};
use crate::analysis::objects::ObjectStore;
use crate::analysis::prompts::{
    build_analysis_prompt, ANALYSIS_MAX_TOKENS, ANALYSIS_SYSTEM, ANALYSIS_TEMPERATURE,
};
use crate::analysis::store::{AnalysisStore, StoreError};
use crate::llm_client::retry::{complete_with_retry, RetryPolicy};
use crate::llm_client::{parse_json_reply, CompletionModel, CompletionRequest, LlmError};
use crate::models::resume::AnalysisResult;

pub const ANALYSIS_QUEUE_CAPACITY: usize = 64;

/// Queued analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisJob {
    pub resume_id: String,
    pub object_key: String,
    pub extension: String,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("No readable text found in resume")]
    EmptyText,

    #[error("AI analysis is not configured")]
    NotConfigured,

    #[error("AI analysis failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Text extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct AnalysisWorker {
    store: Arc<dyn AnalysisStore>,
    objects: Arc<dyn ObjectStore>,
    model: Option<Arc<dyn CompletionModel>>,
    retry: RetryPolicy,
}

impl AnalysisWorker {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        objects: Arc<dyn ObjectStore>,
        model: Option<Arc<dyn CompletionModel>>,
    ) -> Self {
        Self {
            store,
            objects,
            model,
            retry: RetryPolicy::default(),
        }
    }

    pub fn spawn(self, jobs: mpsc::Receiver<AnalysisJob>) -> JoinHandle<()> {
        tokio::spawn(self.run(jobs))
    }

    pub async fn run(self, mut jobs: mpsc::Receiver<AnalysisJob>) {
        info!("Analysis worker started");
        while let Some(job) = jobs.recv().await {
            self.process(&job).await;
        }
        info!("Analysis queue closed, worker stopping");
    }

    /// Runs one job to a terminal record state.
    #[instrument(skip(self), fields(resume_id = %job.resume_id))]
    pub async fn process(&self, job: &AnalysisJob) {
        let outcome = match self.analyze(job).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => self.store.mark_completed(&job.resume_id, &value).await,
                Err(e) => self
                    .store
                    .mark_failed(&job.resume_id, &format!("Could not store analysis: {e}"))
                    .await,
            },
            Err(e) => {
                warn!("Resume analysis failed: {e}");
                self.store.mark_failed(&job.resume_id, &e.to_string()).await
            }
        };

        match outcome {
            Ok(()) => info!("Analysis record finalized"),
            Err(e) => error!("Could not finalize analysis record: {e}"),
        }
    }

    async fn analyze(&self, job: &AnalysisJob) -> Result<AnalysisResult, AnalysisError> {
        let model = self.model.as_ref().ok_or(AnalysisError::NotConfigured)?;

        let bytes = self.objects.get(&job.object_key).await?;
        info!("Downloaded {} bytes from {}", bytes.len(), job.object_key);

        let extension = job.extension.clone();
        let text =
            tokio::task::spawn_blocking(move || extract_text(&bytes, &extension)).await??;
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyText);
        }
        info!("Extracted {} characters", text.len());

        let prompt = build_analysis_prompt(&focus_key_sections(&text));
        let request = CompletionRequest {
            prompt: &prompt,
            system: Some(ANALYSIS_SYSTEM),
            max_tokens: ANALYSIS_MAX_TOKENS,
            temperature: ANALYSIS_TEMPERATURE,
        };
        let reply = complete_with_retry(&**model, &request, &self.retry).await?;

        let mut result: AnalysisResult = parse_json_reply(&reply).map_err(|e| {
            warn!("Model reply was not a valid report: {reply}");
            e
        })?;
        result.compatibility_score = result.compatibility_score.clamp(0.0, 100.0);
        Ok(result)
    }
}
