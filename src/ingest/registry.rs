// src/ingest/registry.rs
//! Closed, code-defined list of connectors, built once at startup.

use futures::future::join_all;
use std::time::Duration;

use crate::config::{FeedConfig, ALL_SOURCE_KEYS};
use crate::ingest::providers::{
    ArxivConnector, DevtoConnector, GithubConnector, GoogleNewsConnector, HackerNewsConnector,
    OfficialBlogsConnector,
};
use crate::ingest::types::Connector;
use crate::model::{FeedSource, RawFeedItem};

pub struct SourceRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl SourceRegistry {
    pub fn new(connectors: Vec<Box<dyn Connector>>) -> Self {
        Self { connectors }
    }

    /// Enabled connectors in canonical registration order.
    pub fn from_config(cfg: &FeedConfig, client: reqwest::Client) -> Self {
        let mut connectors: Vec<Box<dyn Connector>> = Vec::new();
        for key in ALL_SOURCE_KEYS {
            if !cfg.sources.is_enabled(key) {
                continue;
            }
            let c: Box<dyn Connector> = match key {
                "google_news" => Box::new(GoogleNewsConnector::new(client.clone())),
                "arxiv" => Box::new(ArxivConnector::new(client.clone())),
                "hackernews" => Box::new(HackerNewsConnector::new(
                    client.clone(),
                    cfg.http.hackernews_concurrency,
                )),
                "devto" => Box::new(DevtoConnector::new(client.clone())),
                "github" => Box::new(GithubConnector::new(
                    client.clone(),
                    Duration::from_millis(cfg.http.github_delay_ms),
                )),
                "official_blogs" => Box::new(OfficialBlogsConnector::new(client.clone())),
                _ => continue,
            };
            connectors.push(c);
        }
        Self { connectors }
    }

    pub fn connectors(&self) -> &[Box<dyn Connector>] {
        &self.connectors
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.connectors.iter().map(|c| c.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn catalog(&self) -> Vec<FeedSource> {
        self.connectors.iter().flat_map(|c| c.catalog()).collect()
    }

    /// All connectors concurrently; results are concatenated in registration order.
    pub async fn fetch_all(&self) -> Vec<RawFeedItem> {
        let batches = join_all(self.connectors.iter().map(|c| async move {
            let items = c.fetch().await;
            tracing::info!(target: "ingest", source = c.key(), count = items.len(), "connector fetched");
            items
        }))
        .await;
        batches.into_iter().flatten().collect()
    }
}
