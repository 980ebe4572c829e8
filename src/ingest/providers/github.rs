// src/ingest/providers/github.rs
//! GitHub repository search: recently updated Python repos per agent-related topic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::http::get_json;
use crate::ingest::types::Connector;
use crate::ingest::{record_connector_error, truncate_chars};
use crate::model::{RawFeedItem, SourceType};

pub const GITHUB_SEARCH_URL: &str = "https://api.github.com/search/repositories";
pub const GITHUB_QUERIES: [&str; 6] = [
    "ai-agents",
    "llm-agents",
    "autonomous-agents",
    "multi-agent",
    "langchain",
    "autogen",
];
const PER_QUERY: usize = 5;
const TOTAL_CAP: usize = 15;
const ACCEPT: (&str, &str) = ("Accept", "application/vnd.github.v3+json");

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Owner {
    pub login: String,
}

pub struct GithubConnector {
    client: reqwest::Client,
    base_url: String,
    queries: Vec<String>,
    delay: Duration,
}

impl GithubConnector {
    pub fn new(client: reqwest::Client, delay: Duration) -> Self {
        Self {
            client,
            base_url: GITHUB_SEARCH_URL.to_string(),
            queries: GITHUB_QUERIES.iter().map(|q| q.to_string()).collect(),
            delay,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    pub fn query_url(&self, query: &str) -> String {
        format!(
            "{}?q={query}+language:python&sort=updated&order=desc&per_page={PER_QUERY}",
            self.base_url
        )
    }

    pub fn map_repos(resp: SearchResponse, query: &str, now: DateTime<Utc>) -> Vec<RawFeedItem> {
        resp.items
            .into_iter()
            .take(PER_QUERY)
            .map(|repo| {
                let description = repo
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty());
                let title = format!(
                    "{}: {}",
                    repo.full_name,
                    truncate_chars(description.as_deref().unwrap_or("No description"), 100)
                );
                let published_at = repo
                    .updated_at
                    .as_deref()
                    .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(now);
                RawFeedItem {
                    source_id: format!("gh_{}", repo.id),
                    source_type: SourceType::Github,
                    source_name: "GitHub Trending".into(),
                    source_url: repo.html_url,
                    title,
                    content: description.unwrap_or_default(),
                    author: repo.owner.map(|o| o.login),
                    published_at,
                    tags: vec!["Tooling".into(), "Open Source".into(), query.to_string()],
                }
            })
            .collect()
    }

    pub fn parse(json: &str, query: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        let resp: SearchResponse = serde_json::from_str(json).context("parsing github search json")?;
        Ok(Self::map_repos(resp, query, now))
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<RawFeedItem>> {
        let resp: SearchResponse = get_json(&self.client, &self.query_url(query), &[ACCEPT]).await?;
        Ok(Self::map_repos(resp, query, Utc::now()))
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn key(&self) -> &'static str {
        "github"
    }
    fn name(&self) -> &'static str {
        "GitHub Trending"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Github
    }
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Sequential queries with a fixed pause between them (search API rate limit).
    async fn fetch(&self) -> Vec<RawFeedItem> {
        let mut out = Vec::new();
        for (i, q) in self.queries.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.fetch_query(q).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => record_connector_error(self.key(), q, &e),
            }
        }
        out.truncate(TOTAL_CAP);
        counter!("feed_items_fetched_total", "source" => self.key()).increment(out.len() as u64);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_description_gets_placeholder_title() {
        let json = r#"{"items":[{"id":7,"full_name":"acme/agent","html_url":"https://github.com/acme/agent","description":null,"owner":{"login":"acme"},"updated_at":"2024-10-01T12:00:00Z"}]}"#;
        let items = GithubConnector::parse(json, "ai-agents", Utc::now()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "acme/agent: No description");
        assert_eq!(items[0].content, "");
        assert_eq!(items[0].source_id, "gh_7");
        assert_eq!(items[0].author.as_deref(), Some("acme"));
    }

    #[test]
    fn query_url_pins_language_and_sort() {
        let c = GithubConnector::new(reqwest::Client::new(), Duration::ZERO);
        assert_eq!(
            c.query_url("langchain"),
            "https://api.github.com/search/repositories?q=langchain+language:python&sort=updated&order=desc&per_page=5"
        );
    }
}
