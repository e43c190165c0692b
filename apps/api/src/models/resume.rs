use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Lifecycle of a server-side analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Terminal statuses never change without a new upload.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Processing)
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            _ => Err(format!("Invalid analysis status: {s}")),
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tech-career compatibility report produced by the analysis worker.
///
/// All four keys are required when parsing model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub compatibility_score: f64,
    pub top_technical_skills_found: Vec<String>,
    pub compatibility_explanation: String,
    pub suggested_keywords: Vec<String>,
}

/// Persisted analysis record, keyed by `resume_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub resume_id: String,
    pub object_key: String,
    pub file_name: String,
    pub status: String,
    pub analysis_results: Option<Value>,
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl AnalysisRecord {
    /// A freshly uploaded resume waiting for the worker.
    pub fn processing(resume_id: &str, object_key: &str, file_name: &str) -> Self {
        Self {
            resume_id: resume_id.to_string(),
            object_key: object_key.to_string(),
            file_name: file_name.to_string(),
            status: AnalysisStatus::Processing.as_str().to_string(),
            analysis_results: None,
            error_message: None,
            uploaded_at: Utc::now(),
            analyzed_at: None,
        }
    }
}

/// Response body of `GET /api/resume-status/:resume_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub resume_id: String,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_results: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl TryFrom<AnalysisRecord> for StatusResponse {
    type Error = String;

    fn try_from(record: AnalysisRecord) -> Result<Self, Self::Error> {
        let status = record.status.parse::<AnalysisStatus>()?;
        Ok(StatusResponse {
            resume_id: record.resume_id,
            status,
            analysis_results: record.analysis_results,
            error_message: record.error_message,
            file_name: record.file_name,
            uploaded_at: record.uploaded_at,
        })
    }
}
