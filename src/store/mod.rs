// src/store/mod.rs
//! Persistence boundary: posts, run logs and the source catalog.
//!
//! `source_id` uniqueness is enforced here and is the dedup ground truth. Two
//! implementations share the same semantics:
//! - `SqliteStore` (sqlx, durable)
//! - `InMemoryStore` (tests, ephemeral runs)

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::{FeedSource, FetchRunLog, KnowledgePost, NewPost, PostQuery, RunCompletion};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate source_id: {0}")]
    Duplicate(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStats {
    pub total_posts: i64,
    pub today_posts: i64,
    pub week_posts: i64,
    pub active_sources: i64,
    pub last_fetch: Option<DateTime<Utc>>,
    pub top_tags: Vec<TagCount>,
}

pub const TOP_TAGS_IN_STATS: usize = 10;

#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Every persisted `source_id`.
    async fn existing_source_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Fails with `StoreError::Duplicate` when `source_id` is already present.
    async fn insert_post(&self, post: &NewPost) -> Result<KnowledgePost, StoreError>;

    async fn get_post(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError>;

    /// Bumps `view_count` on a published post and returns it.
    async fn record_view(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError>;

    /// Published posts matching `q`, newest first, plus the unpaginated total.
    async fn list_posts(&self, q: &PostQuery) -> Result<(Vec<KnowledgePost>, usize), StoreError>;

    async fn count_published_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError>;

    /// Tag frequencies over published posts created at or after `since`.
    async fn tag_counts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TagCount>, StoreError>;

    /// New `in_progress` log row.
    async fn start_run(
        &self,
        source_name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchRunLog, StoreError>;

    async fn finish_run(&self, id: i64, done: &RunCompletion) -> Result<(), StoreError>;

    /// Newest first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<FetchRunLog>, StoreError>;

    /// Success log with the latest `completed_at`.
    async fn last_successful_run(&self) -> Result<Option<FetchRunLog>, StoreError>;

    /// Insert or refresh rows keyed by name.
    async fn upsert_sources(&self, sources: &[FeedSource]) -> Result<(), StoreError>;

    async fn list_sources(&self) -> Result<Vec<FeedSource>, StoreError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<FeedStats, StoreError> {
        let today_start = start_of_day(now);
        let week_ago = now - Duration::days(7);
        Ok(FeedStats {
            total_posts: self.count_published_since(None).await?,
            today_posts: self.count_published_since(Some(today_start)).await?,
            week_posts: self.count_published_since(Some(week_ago)).await?,
            active_sources: self
                .list_sources()
                .await?
                .iter()
                .filter(|s| s.is_active)
                .count() as i64,
            last_fetch: self
                .last_successful_run()
                .await?
                .and_then(|l| l.completed_at),
            top_tags: self.tag_counts(week_ago, TOP_TAGS_IN_STATS).await?,
        })
    }
}

/// Midnight UTC of `now`'s day.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_hour(0)
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(now)
}

/// Highest count first, then tag name; shared by both stores.
pub(crate) fn sort_tag_counts(mut v: Vec<TagCount>, limit: usize) -> Vec<TagCount> {
    v.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    v.truncate(limit);
    v
}
