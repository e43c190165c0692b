// Client side of the resume analysis flow: validate, upload, poll.
// Framework-agnostic; the CLI and any UI drive it through `ResumeAnalysisWorkflow`.

pub mod client;
pub mod poller;
pub mod validation;
pub mod workflow;

pub use client::{AnalysisApi, HttpAnalysisApi, JobHandle, UploadError};
pub use poller::{PollConfig, PollError};
pub use validation::{validate, ResumeFile, ValidationError};
pub use workflow::{ResumeAnalysisWorkflow, UploadJob, WorkflowError, WorkflowStatus};
