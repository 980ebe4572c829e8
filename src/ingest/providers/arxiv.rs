// src/ingest/providers/arxiv.rs
//! ArXiv Atom export API (cs.AI, cs.MA, cs.LG, cs.CL; newest submissions first).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::http::get_text;
use crate::ingest::types::Connector;
use crate::ingest::{collapse_ws, record_connector_error};
use crate::model::{RawFeedItem, SourceType};

pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
pub const ARXIV_CATEGORIES: [&str; 4] = ["cs.AI", "cs.MA", "cs.LG", "cs.CL"];
pub const ARXIV_MAX_RESULTS: usize = 20;
const MAX_NAMED_AUTHORS: usize = 3;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "arxiv:primary_category", alias = "primary_category", default)]
    primary_category: Option<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
}

pub struct ArxivConnector {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: ARXIV_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// `+OR+` must stay literal, so the query string is assembled by hand.
    pub fn query_url(&self) -> String {
        let cats = ARXIV_CATEGORIES
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join("+OR+");
        format!(
            "{}?search_query={cats}&sortBy=submittedDate&sortOrder=descending&max_results={ARXIV_MAX_RESULTS}",
            self.base_url
        )
    }

    /// Entries missing an id or title are skipped.
    pub fn parse(xml: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        let t0 = std::time::Instant::now();
        let feed: Feed = from_str(xml).context("parsing arxiv atom")?;

        let mut out = Vec::with_capacity(feed.entries.len());
        for e in feed.entries {
            let Some(id) = e.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
                continue;
            };
            let title = collapse_ws(e.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let paper_id = id.rsplit('/').next().unwrap_or(&id).to_string();

            let source_url = e
                .links
                .iter()
                .find(|l| l.kind.as_deref() == Some("text/html"))
                .and_then(|l| l.href.clone())
                .unwrap_or_else(|| id.clone());

            let names: Vec<String> = e
                .authors
                .into_iter()
                .filter_map(|a| a.name.map(|n| collapse_ws(&n)))
                .filter(|n| !n.is_empty())
                .collect();
            let author = if names.is_empty() {
                None
            } else {
                let mut s = names
                    .iter()
                    .take(MAX_NAMED_AUTHORS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                if names.len() > MAX_NAMED_AUTHORS {
                    s.push_str(" et al.");
                }
                Some(s)
            };

            let mut tags = vec!["Research".to_string(), "AI".to_string()];
            if let Some(term) = e
                .primary_category
                .and_then(|c| c.term)
                .filter(|t| !t.is_empty())
            {
                tags.push(term);
            }

            let published_at = e
                .published
                .as_deref()
                .and_then(|p| DateTime::parse_from_rfc3339(p.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);

            out.push(RawFeedItem {
                source_id: format!("arxiv_{paper_id}"),
                source_type: SourceType::Arxiv,
                source_name: "ArXiv".into(),
                source_url,
                title,
                content: e.summary.map(|s| s.trim().to_string()).unwrap_or_default(),
                author,
                published_at,
                tags,
            });
        }

        histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }

    async fn fetch_feed(&self) -> Result<Vec<RawFeedItem>> {
        let body = get_text(&self.client, &self.query_url()).await?;
        Self::parse(&body, Utc::now())
    }
}

#[async_trait]
impl Connector for ArxivConnector {
    fn key(&self) -> &'static str {
        "arxiv"
    }
    fn name(&self) -> &'static str {
        "ArXiv"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Arxiv
    }
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self) -> Vec<RawFeedItem> {
        match self.fetch_feed().await {
            Ok(items) => {
                counter!("feed_items_fetched_total", "source" => self.key())
                    .increment(items.len() as u64);
                items
            }
            Err(e) => {
                record_connector_error(self.key(), "categories", &e);
                Vec::new()
            }
        }
    }
}
