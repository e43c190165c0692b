use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sumakses_api::analysis::{
    AnalysisStore, AnalysisWorker, InMemoryAnalysisStore, InMemoryObjectStore, ObjectStore,
    PgAnalysisStore, S3ObjectStore, StatusCache, ANALYSIS_QUEUE_CAPACITY,
};
use sumakses_api::chat::ChatProxy;
use sumakses_api::config::{Config, DatabaseConfig};
use sumakses_api::db::create_pool;
use sumakses_api::llm_client::{CompletionModel, LlmClient};
use sumakses_api::routes::build_router;
use sumakses_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SUMAKSES API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn AnalysisStore> = match &config.database {
        Some(db) => match connect_store(db).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("PostgreSQL unavailable, falling back to in-memory records: {e:#}");
                Arc::new(InMemoryAnalysisStore::default())
            }
        },
        None => {
            warn!("DATABASE_URL not set, analysis records are kept in memory");
            Arc::new(InMemoryAnalysisStore::default())
        }
    };

    let objects: Arc<dyn ObjectStore> = match &config.object_store {
        Some(s3) => {
            info!("S3 object store initialized (bucket: {})", s3.bucket);
            Arc::new(S3ObjectStore::from_config(s3).await)
        }
        None => {
            warn!("S3_BUCKET not set, uploaded resumes are kept in memory");
            Arc::new(InMemoryObjectStore::default())
        }
    };

    let model: Option<Arc<dyn CompletionModel>> = match LlmClient::new(&config.llm) {
        Ok(client) => {
            info!("LLM client initialized (model: {})", client.model());
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("{e}; chat and resume analysis are unavailable");
            None
        }
    };

    let (queue, jobs) = mpsc::channel(ANALYSIS_QUEUE_CAPACITY);
    AnalysisWorker::new(store.clone(), objects.clone(), model.clone()).spawn(jobs);

    let state = AppState {
        store,
        objects,
        status_cache: Arc::new(StatusCache::new(config.status_cache_ttl)),
        chat: Arc::new(ChatProxy::new(model)),
        analysis_queue: queue,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect_store(config: &DatabaseConfig) -> Result<PgAnalysisStore> {
    let pool = create_pool(config).await?;
    let store = PgAnalysisStore::new(pool, &config.table_name);
    store.ensure_schema().await?;
    info!("Analysis records stored in table '{}'", config.table_name);
    Ok(store)
}
