// Server side of resume analysis: upload intake, background worker, and the
// cached status endpoint the client polls.

pub mod cache;
pub mod extract;
pub mod handlers;
pub mod objects;
pub mod processor;
pub mod prompts;
pub mod store;

pub use cache::StatusCache;
pub use objects::{InMemoryObjectStore, ObjectStore, S3ObjectStore};
pub use processor::{AnalysisJob, AnalysisWorker, ANALYSIS_QUEUE_CAPACITY};
pub use store::{AnalysisStore, InMemoryAnalysisStore, PgAnalysisStore, StoreError};
