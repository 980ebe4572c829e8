// src/ingest/providers/hackernews.rs
//! Hacker News Firebase API: top stories, filtered to AI-related ones.
//!
//! Story bodies are fetched concurrently with a bounded number in flight; a failed
//! story fetch is counted and skipped without cancelling its siblings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Deserialize;
use std::future::Future;

use crate::ingest::http::get_json;
use crate::ingest::types::Connector;
use crate::ingest::{record_connector_error, strip_markup};
use crate::model::{RawFeedItem, SourceType};

pub const HN_API_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const HN_ITEM_PAGE: &str = "https://news.ycombinator.com/item?id=";
pub const HN_AI_KEYWORDS: [&str; 11] = [
    "AI",
    "GPT",
    "LLM",
    "agent",
    "automation",
    "machine learning",
    "neural",
    "transformer",
    "anthropic",
    "openai",
    "claude",
];
const TOP_IDS: usize = 100;
const DETAIL_FETCHES: usize = 50;
const KEEP: usize = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
}

/// Run `f` over `inputs` with at most `limit` futures in flight.
///
/// Successes keep input order; errors are collected separately.
pub async fn bounded_fan_out<I, T, F, Fut>(inputs: Vec<I>, limit: usize, f: F) -> (Vec<T>, Vec<anyhow::Error>)
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results: Vec<Result<T>> = stream::iter(inputs)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await;

    let mut ok = Vec::with_capacity(results.len());
    let mut errs = Vec::new();
    for r in results {
        match r {
            Ok(v) => ok.push(v),
            Err(e) => errs.push(e),
        }
    }
    (ok, errs)
}

/// Case-insensitive substring match over title + text.
pub fn is_ai_related(story: &Story) -> bool {
    let hay = format!(
        "{} {}",
        story.title.as_deref().unwrap_or_default(),
        story.text.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    HN_AI_KEYWORDS
        .iter()
        .any(|kw| hay.contains(&kw.to_lowercase()))
}

pub fn story_to_item(story: Story, now: DateTime<Utc>) -> RawFeedItem {
    let title = story.title.unwrap_or_default();
    let content = story
        .text
        .as_deref()
        .map(strip_markup)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title.clone());
    RawFeedItem {
        source_id: format!("hn_{}", story.id),
        source_type: SourceType::Hackernews,
        source_name: "Hacker News".into(),
        source_url: story
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("{HN_ITEM_PAGE}{}", story.id)),
        title,
        content,
        author: story.by,
        published_at: story
            .time
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
            .unwrap_or(now),
        tags: vec!["Discussion".into(), "Tech".into()],
    }
}

/// Filter fetched stories (already in rank order) and cap the kept set.
pub fn select_stories(stories: Vec<Option<Story>>, now: DateTime<Utc>) -> Vec<RawFeedItem> {
    stories
        .into_iter()
        .flatten()
        .filter(is_ai_related)
        .take(KEEP)
        .map(|s| story_to_item(s, now))
        .collect()
}

pub struct HackerNewsConnector {
    client: reqwest::Client,
    base_url: String,
    concurrency: usize,
}

impl HackerNewsConnector {
    pub fn new(client: reqwest::Client, concurrency: usize) -> Self {
        Self {
            client,
            base_url: HN_API_URL.to_string(),
            concurrency,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn top_ids(&self) -> Result<Vec<u64>> {
        let url = format!("{}/topstories.json", self.base_url);
        let mut ids: Vec<u64> = get_json(&self.client, &url, &[])
            .await
            .context("hn topstories")?;
        ids.truncate(TOP_IDS);
        Ok(ids)
    }

    /// `null` bodies (deleted items) come back as `None`.
    async fn story(&self, id: u64) -> Result<Option<Story>> {
        let url = format!("{}/item/{id}.json", self.base_url);
        get_json(&self.client, &url, &[])
            .await
            .with_context(|| format!("hn item {id}"))
    }
}

#[async_trait]
impl Connector for HackerNewsConnector {
    fn key(&self) -> &'static str {
        "hackernews"
    }
    fn name(&self) -> &'static str {
        "Hacker News"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Hackernews
    }
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self) -> Vec<RawFeedItem> {
        let ids = match self.top_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                record_connector_error(self.key(), "topstories", &e);
                return Vec::new();
            }
        };

        let wanted: Vec<u64> = ids.into_iter().take(DETAIL_FETCHES).collect();
        let (stories, errs) =
            bounded_fan_out(wanted, self.concurrency, |id| self.story(id)).await;
        for e in &errs {
            record_connector_error(self.key(), "item", e);
        }

        let items = select_stories(stories, Utc::now());
        counter!("feed_items_fetched_total", "source" => self.key()).increment(items.len() as u64);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: u64, title: &str, text: Option<&str>) -> Story {
        Story {
            id,
            title: Some(title.into()),
            text: text.map(Into::into),
            url: None,
            by: Some("pg".into()),
            time: Some(1_700_000_000),
        }
    }

    #[test]
    fn keyword_filter_is_case_insensitive_substring() {
        assert!(is_ai_related(&story(1, "Show HN: my LLM toolkit", None)));
        assert!(is_ai_related(&story(2, "Ask HN", Some("Thoughts on OpenAI?"))));
        // substring semantics: "AI" also matches inside other words
        assert!(is_ai_related(&story(3, "Maintaining a garden", None)));
        assert!(!is_ai_related(&story(4, "Rust 1.80 released", None)));
    }

    #[test]
    fn story_falls_back_to_item_page_and_title() {
        let it = story_to_item(story(42, "GPT agents", None), Utc::now());
        assert_eq!(it.source_id, "hn_42");
        assert_eq!(it.source_url, "https://news.ycombinator.com/item?id=42");
        assert_eq!(it.content, "GPT agents");
        assert_eq!(it.published_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn select_caps_and_skips_null_bodies() {
        let mut v: Vec<Option<Story>> = (0..30).map(|i| Some(story(i, "AI news", None))).collect();
        v.insert(3, None);
        let items = select_stories(v, Utc::now());
        assert_eq!(items.len(), 15);
        assert_eq!(items[0].source_id, "hn_0");
    }

    #[tokio::test]
    async fn fan_out_collects_errors_without_cancelling_siblings() {
        let (ok, errs) = bounded_fan_out((0..10u32).collect(), 3, |i| async move {
            if i % 4 == 0 {
                Err(anyhow::anyhow!("boom {i}"))
            } else {
                Ok(i * 10)
            }
        })
        .await;
        assert_eq!(ok, vec![10, 20, 30, 50, 60, 70, 90]);
        assert_eq!(errs.len(), 3);
    }
}
