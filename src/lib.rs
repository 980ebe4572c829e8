// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod scheduler;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::scheduler::{FeedPipeline, RunError, RunSummary};

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::FeedConfig;
use crate::metrics::Metrics;
use crate::store::{FeedStore, SqliteStore};

/// Idempotent tracing setup. `FEED_LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed by the host runtime wins; this is then a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_knowledge_feed=info,warn"));
    let json = std::env::var("FEED_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Store + pipeline from config, catalog synced. Shared by the server and `feed_once`.
pub async fn build_pipeline(cfg: &FeedConfig) -> Result<Arc<FeedPipeline>> {
    let store = SqliteStore::connect(&cfg.storage.database_url)
        .await
        .with_context(|| format!("opening store at {}", cfg.storage.database_url))?;
    let store: Arc<dyn FeedStore> = Arc::new(store);
    let pipeline = Arc::new(FeedPipeline::from_config(cfg, store)?);
    let n = pipeline.sync_sources().await?;
    tracing::info!(sources = n, "feed source catalog synced");
    Ok(pipeline)
}

/// Full in-process app: pipeline, metrics recorder and router.
pub async fn app(cfg: &FeedConfig) -> Result<(shuttle_axum::axum::Router, Arc<FeedPipeline>)> {
    let pipeline = build_pipeline(cfg).await?;
    let metrics = Metrics::init()?;
    let router = api::router(AppState::new(pipeline.clone(), metrics));
    Ok((router, pipeline))
}
