// tests/common/mod.rs
// Shared builders for integration tests: stub connectors and a fault-injecting store.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ai_knowledge_feed::analyze::ContentProcessor;
use ai_knowledge_feed::config::PipelineConfig;
use ai_knowledge_feed::ingest::registry::SourceRegistry;
use ai_knowledge_feed::ingest::types::Connector;
use ai_knowledge_feed::model::{
    FeedSource, FetchRunLog, KnowledgePost, NewPost, PostQuery, RawFeedItem, RunCompletion,
    SourceType,
};
use ai_knowledge_feed::scheduler::FeedPipeline;
use ai_knowledge_feed::store::{FeedStore, InMemoryStore, StoreError, TagCount};

pub fn raw(id: &str, source_type: SourceType, title: &str, content: &str) -> RawFeedItem {
    RawFeedItem {
        source_id: id.to_string(),
        source_type,
        source_name: "Test Feed".to_string(),
        source_url: format!("https://example.com/{id}"),
        title: title.to_string(),
        content: content.to_string(),
        author: None,
        published_at: Utc::now(),
        tags: vec![],
    }
}

/// Five distinct, clearly on-topic items (relevance 0.45 each).
pub fn five_relevant_items() -> Vec<RawFeedItem> {
    (1..=5)
        .map(|i| {
            raw(
                &format!("stub_{i}"),
                SourceType::Rss,
                &format!("Field report {i}: llm agents"),
                "A gpt based assistant compared against claude.",
            )
        })
        .collect()
}

/// Connector that returns a fixed batch, optionally after a pause.
pub struct StubConnector {
    pub key: &'static str,
    pub items: Vec<RawFeedItem>,
    pub delay: Option<std::time::Duration>,
}

impl StubConnector {
    pub fn boxed(key: &'static str, items: Vec<RawFeedItem>) -> Box<dyn Connector> {
        Box::new(Self {
            key,
            items,
            delay: None,
        })
    }

    pub fn slow(
        key: &'static str,
        items: Vec<RawFeedItem>,
        delay: std::time::Duration,
    ) -> Box<dyn Connector> {
        Box::new(Self {
            key,
            items,
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl Connector for StubConnector {
    fn key(&self) -> &'static str {
        self.key
    }
    fn name(&self) -> &'static str {
        "Stub"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }
    fn base_url(&self) -> String {
        format!("stub://{}", self.key)
    }
    async fn fetch(&self) -> Vec<RawFeedItem> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.items.clone()
    }
}

/// In-memory store that can fail the n-th insert (1-based) or the existing-id lookup.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_insert_call: Option<usize>,
    pub fail_existing_ids: bool,
    inserts: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_insert(n: usize) -> Self {
        Self {
            fail_insert_call: Some(n),
            ..Self::default()
        }
    }

    pub fn failing_existing_ids() -> Self {
        Self {
            fail_existing_ids: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FeedStore for FlakyStore {
    async fn existing_source_ids(&self) -> Result<HashSet<String>, StoreError> {
        if self.fail_existing_ids {
            return Err(StoreError::Unavailable("injected lookup failure".into()));
        }
        self.inner.existing_source_ids().await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<KnowledgePost, StoreError> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_call == Some(n) {
            return Err(StoreError::Unavailable(format!("injected insert failure #{n}")));
        }
        self.inner.insert_post(post).await
    }

    async fn get_post(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        self.inner.get_post(id).await
    }

    async fn record_view(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        self.inner.record_view(id).await
    }

    async fn list_posts(&self, q: &PostQuery) -> Result<(Vec<KnowledgePost>, usize), StoreError> {
        self.inner.list_posts(q).await
    }

    async fn count_published_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        self.inner.count_published_since(since).await
    }

    async fn tag_counts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TagCount>, StoreError> {
        self.inner.tag_counts(since, limit).await
    }

    async fn start_run(
        &self,
        source_name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchRunLog, StoreError> {
        self.inner.start_run(source_name, started_at).await
    }

    async fn finish_run(&self, id: i64, done: &RunCompletion) -> Result<(), StoreError> {
        self.inner.finish_run(id, done).await
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<FetchRunLog>, StoreError> {
        self.inner.recent_runs(limit).await
    }

    async fn last_successful_run(&self) -> Result<Option<FetchRunLog>, StoreError> {
        self.inner.last_successful_run().await
    }

    async fn upsert_sources(&self, sources: &[FeedSource]) -> Result<(), StoreError> {
        self.inner.upsert_sources(sources).await
    }

    async fn list_sources(&self) -> Result<Vec<FeedSource>, StoreError> {
        self.inner.list_sources().await
    }
}

pub fn pipeline_with(
    store: Arc<dyn FeedStore>,
    items: Vec<RawFeedItem>,
    cfg: &PipelineConfig,
) -> FeedPipeline {
    pipeline_with_connectors(store, vec![StubConnector::boxed("stub", items)], cfg)
}

pub fn pipeline_with_connectors(
    store: Arc<dyn FeedStore>,
    connectors: Vec<Box<dyn Connector>>,
    cfg: &PipelineConfig,
) -> FeedPipeline {
    let processor = ContentProcessor::with_default_rules().expect("default rules compile");
    FeedPipeline::new(SourceRegistry::new(connectors), processor, store, cfg)
}
