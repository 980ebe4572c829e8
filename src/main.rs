//! AI Knowledge Feed, binary entrypoint.
//! Boots the Axum HTTP server and the periodic feed scheduler.

use std::time::Duration;

use ai_knowledge_feed::{app, config::FeedConfig, init_tracing, scheduler::spawn_daily_scheduler};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = FeedConfig::load_default()?;
    let (router, pipeline) = app(&cfg).await?;

    if cfg.scheduler.enabled {
        spawn_daily_scheduler(pipeline, Duration::from_secs(cfg.scheduler.interval_secs));
    } else {
        tracing::info!("periodic scheduler disabled; use POST /fetch or feed_once");
    }

    Ok(router.into())
}
