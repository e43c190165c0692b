use std::sync::Arc;

use tokio::sync::mpsc;

use crate::analysis::cache::StatusCache;
use crate::analysis::objects::ObjectStore;
use crate::analysis::processor::AnalysisJob;
use crate::analysis::store::AnalysisStore;
use crate::chat::ChatProxy;
use crate::models::resume::StatusResponse;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalysisStore>,
    pub objects: Arc<dyn ObjectStore>,
    /// Terminal statuses only; created once at startup.
    pub status_cache: Arc<StatusCache<StatusResponse>>,
    pub chat: Arc<ChatProxy>,
    /// Feeds the background `AnalysisWorker`.
    pub analysis_queue: mpsc::Sender<AnalysisJob>,
}
