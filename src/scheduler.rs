// src/scheduler.rs
//! Run orchestrator: fetch → dedup → process → rank → persist, tracked by one log row.
//!
//! Log lifecycle is `in_progress → success | failed`. Per-item persistence failures
//! are skipped; anything else escaping the pipeline marks the run `failed` and is
//! returned to the caller. No automatic retry.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyze::{rank_and_select, ContentProcessor, RankParams};
use crate::config::{FeedConfig, PipelineConfig, MAX_REFETCH_AFTER_HOURS};
use crate::ingest::dedup::dedup_batch;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::{ensure_metrics_described, http::build_client};
use crate::model::{FetchRunLog, NewPost, RunCompletion, RunStatus};
use crate::store::{FeedStore, StoreError};

/// `source_name` written on run log rows; one row covers every connector.
pub const RUN_LOG_SOURCE: &str = "all_sources";

#[derive(Error, Debug)]
pub enum RunError {
    #[error("a feed run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub items_fetched: i64,
    pub items_processed: i64,
    pub items_published: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RunCounts {
    fetched: i64,
    processed: i64,
    published: i64,
}

/// A run is due when no successful run exists or the last one completed more than
/// `refetch_after` ago. Advisory; forced runs ignore it.
pub fn is_run_due(
    last_success: Option<&FetchRunLog>,
    now: DateTime<Utc>,
    refetch_after: ChronoDuration,
) -> bool {
    match last_success.and_then(|l| l.completed_at) {
        None => true,
        Some(done) => now - done > refetch_after,
    }
}

pub struct FeedPipeline {
    registry: SourceRegistry,
    processor: ContentProcessor,
    store: Arc<dyn FeedStore>,
    rank: RankParams,
    refetch_after: ChronoDuration,
    running: Mutex<()>,
}

/// Cooldown as a chrono duration; out-of-range hours are clamped to the
/// validated range instead of overflowing.
fn refetch_window(hours: i64) -> ChronoDuration {
    ChronoDuration::try_hours(hours.clamp(0, MAX_REFETCH_AFTER_HOURS))
        .unwrap_or_else(|| ChronoDuration::hours(MAX_REFETCH_AFTER_HOURS))
}

impl FeedPipeline {
    pub fn new(
        registry: SourceRegistry,
        processor: ContentProcessor,
        store: Arc<dyn FeedStore>,
        pipeline: &PipelineConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            processor,
            store,
            rank: RankParams::from(pipeline),
            refetch_after: refetch_window(pipeline.refetch_after_hours),
            running: Mutex::new(()),
        }
    }

    /// Shared HTTP client, enabled connectors and the configured rule table.
    pub fn from_config(cfg: &FeedConfig, store: Arc<dyn FeedStore>) -> Result<Self> {
        let client = build_client(&cfg.http)?;
        let registry = SourceRegistry::from_config(cfg, client);
        let rules = cfg.rule_table().context("loading rule table")?;
        info!(target: "scheduler", rules_version = %rules.version, connectors = ?registry.keys(), "feed pipeline configured");
        let processor = ContentProcessor::new(rules)?;
        Ok(Self::new(registry, processor, store, &cfg.pipeline))
    }

    pub fn store(&self) -> &Arc<dyn FeedStore> {
        &self.store
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn processor(&self) -> &ContentProcessor {
        &self.processor
    }

    pub fn refetch_after(&self) -> ChronoDuration {
        self.refetch_after
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Writes the registry catalog into the store's `FeedSource` rows.
    pub async fn sync_sources(&self) -> Result<usize> {
        let catalog = self.registry.catalog();
        self.store
            .upsert_sources(&catalog)
            .await
            .context("upserting feed sources")?;
        Ok(catalog.len())
    }

    pub async fn last_successful_run(&self) -> Result<Option<FetchRunLog>> {
        self.store
            .last_successful_run()
            .await
            .context("loading last successful run")
    }

    /// Idempotency gate against the store's latest successful run.
    pub async fn should_fetch(&self, now: DateTime<Utc>) -> Result<bool> {
        let last = self.last_successful_run().await?;
        Ok(is_run_due(last.as_ref(), now, self.refetch_after))
    }

    /// One full run. Refuses to overlap with another run on this pipeline.
    pub async fn run_daily_update(&self) -> Result<RunSummary, RunError> {
        let _guard = self.running.try_lock().map_err(|_| RunError::AlreadyRunning)?;

        let started = Instant::now();
        let started_at = Utc::now();
        let log = self
            .store
            .start_run(RUN_LOG_SOURCE, started_at)
            .await
            .context("creating run log")?;
        info!(target: "scheduler", run_id = log.id, "feed run started");

        let mut counts = RunCounts::default();
        let outcome = self.execute(&mut counts).await;
        let completed_at = Utc::now();
        let elapsed_ms = started.elapsed().as_millis() as f64;

        let (status, error_message) = match &outcome {
            Ok(()) => (RunStatus::Success, None),
            Err(e) => (RunStatus::Failed, Some(format!("{e:#}"))),
        };
        let done = RunCompletion {
            completed_at,
            status,
            items_fetched: counts.fetched,
            items_processed: counts.processed,
            items_published: counts.published,
            error_message,
        };
        let finished = self.store.finish_run(log.id, &done).await;

        counter!("feed_runs_total", "status" => status.as_str()).increment(1);
        histogram!("feed_run_duration_ms").record(elapsed_ms);
        gauge!("feed_last_run_ts").set(completed_at.timestamp() as f64);

        if let Err(e) = outcome {
            error!(target: "scheduler", run_id = log.id, error = %format!("{e:#}"), "feed run failed");
            if let Err(fe) = finished {
                error!(target: "scheduler", run_id = log.id, error = %fe, "could not mark run failed");
            }
            return Err(RunError::Failed(e));
        }
        finished.with_context(|| format!("finalizing run log {}", log.id))?;

        info!(
            target: "scheduler",
            run_id = log.id,
            fetched = counts.fetched,
            processed = counts.processed,
            published = counts.published,
            elapsed_ms,
            "feed run finished"
        );

        Ok(RunSummary {
            run_id: log.id,
            status,
            items_fetched: counts.fetched,
            items_processed: counts.processed,
            items_published: counts.published,
            started_at,
            completed_at,
        })
    }

    async fn execute(&self, counts: &mut RunCounts) -> Result<()> {
        let raw = self.registry.fetch_all().await;
        counts.fetched = raw.len() as i64;

        let existing = self
            .store
            .existing_source_ids()
            .await
            .context("loading existing source ids")?;
        let (fresh, dedup) = dedup_batch(raw, &existing);
        debug!(target: "scheduler", kept = fresh.len(), dropped = dedup.dropped(), "dedup done");

        let processed = self.processor.process_batch(fresh);
        counts.processed = processed.len() as i64;

        let selected = rank_and_select(processed, &self.rank);
        debug!(target: "scheduler", selected = selected.len(), "ranking done");

        for item in selected {
            let post = NewPost::from(item);
            match self.store.insert_post(&post).await {
                Ok(saved) => {
                    counts.published += 1;
                    debug!(target: "scheduler", id = saved.id, source_id = %saved.source_id, "post saved");
                }
                Err(StoreError::Duplicate(id)) => {
                    warn!(target: "scheduler", source_id = %id, "skipping post already in store");
                }
                Err(e) => {
                    counter!("feed_persist_errors_total").increment(1);
                    warn!(target: "scheduler", source_id = %post.source_id, error = %e, "failed to save post");
                }
            }
        }
        counter!("feed_items_published_total").increment(counts.published as u64);
        Ok(())
    }
}

/// Ticks every `interval`, runs when the gate says so. Errors are logged; the loop keeps going.
pub fn spawn_daily_scheduler(pipeline: Arc<FeedPipeline>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match pipeline.should_fetch(Utc::now()).await {
                Ok(true) => match pipeline.run_daily_update().await {
                    Ok(s) => {
                        info!(target: "scheduler", run_id = s.run_id, published = s.items_published, "scheduled run done")
                    }
                    Err(RunError::AlreadyRunning) => {
                        debug!(target: "scheduler", "scheduled tick skipped; run in progress")
                    }
                    Err(e) => warn!(target: "scheduler", error = %format!("{e:#}"), "scheduled run failed"),
                },
                Ok(false) => debug!(target: "scheduler", "scheduled tick: not due"),
                Err(e) => warn!(target: "scheduler", error = %format!("{e:#}"), "idempotency gate check failed"),
            }
        }
    })
}
