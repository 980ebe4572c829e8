// src/ingest/providers/rss.rs
//! RSS 2.0 family: Google News search, Dev.to tag feeds, official AI blogs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::http::get_text;
use crate::ingest::types::Connector;
use crate::ingest::{
    record_connector_error, scrub_html_entities_for_xml, stable_source_id, strip_markup,
    truncate_chars,
};
use crate::model::{FeedSource, RawFeedItem, SourceType};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:creator", alias = "creator")]
    creator: Option<String>,
}

/// One `<item>` with the fields every RSS connector cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct RssEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub creator: Option<String>,
}

/// Items without a title or link are skipped.
pub fn parse_rss_entries(xml: &str) -> Result<Vec<RssEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

    let out = rss
        .channel
        .items
        .into_iter()
        .filter_map(|it| {
            let title = it.title.map(|t| t.trim().to_string())?;
            let link = it.link.map(|l| l.trim().to_string())?;
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(RssEntry {
                title,
                link,
                description: it.description.unwrap_or_default(),
                pub_date: it.pub_date,
                creator: it.creator.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            })
        })
        .collect::<Vec<_>>();

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// RFC 2822 (numeric offsets or zone names like GMT), then RFC 3339; else `fallback`.
pub fn parse_pub_date(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc2822) {
        if let Some(c) = DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()) {
            return c;
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    fallback
}

/// How entries of one feed become `RawFeedItem`s.
#[derive(Debug, Clone)]
pub struct RssMapping {
    pub id_prefix: &'static str,
    pub source_name: String,
    pub per_feed: usize,
    pub max_content_chars: usize,
    pub tags: Vec<String>,
}

pub fn map_entries(entries: Vec<RssEntry>, m: &RssMapping, now: DateTime<Utc>) -> Vec<RawFeedItem> {
    entries
        .into_iter()
        .take(m.per_feed)
        .map(|e| RawFeedItem {
            source_id: stable_source_id(m.id_prefix, &e.link),
            source_type: SourceType::Rss,
            source_name: m.source_name.clone(),
            source_url: e.link,
            title: strip_markup(&e.title),
            content: truncate_chars(&strip_markup(&e.description), m.max_content_chars),
            author: e.creator,
            published_at: parse_pub_date(e.pub_date.as_deref(), now),
            tags: m.tags.clone(),
        })
        .collect()
}

fn parse_and_map(xml: &str, m: &RssMapping, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
    Ok(map_entries(parse_rss_entries(xml)?, m, now))
}

// ---------------------------------------------------------------------------
// Google News
// ---------------------------------------------------------------------------

pub const GOOGLE_NEWS_URL: &str = "https://news.google.com/rss/search";

pub const GOOGLE_NEWS_QUERIES: [&str; 5] = [
    "AI agents technology",
    "multi-agent systems artificial intelligence",
    "AI automation workflows",
    "applied AI engineering",
    "large language models applications",
];

pub struct GoogleNewsConnector {
    client: reqwest::Client,
    base_url: String,
    queries: Vec<String>,
}

impl GoogleNewsConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: GOOGLE_NEWS_URL.to_string(),
            queries: GOOGLE_NEWS_QUERIES.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn query_url(&self, query: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[("q", query), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")],
        )
        .with_context(|| format!("building google news url for {query:?}"))?;
        Ok(url.to_string())
    }

    pub fn mapping_for(query: &str) -> RssMapping {
        let first = query
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        RssMapping {
            id_prefix: "gnews",
            source_name: "Google News".into(),
            per_feed: 5,
            max_content_chars: 1000,
            tags: vec!["AI".into(), first],
        }
    }

    pub fn parse(xml: &str, query: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        parse_and_map(xml, &Self::mapping_for(query), now)
    }

    async fn fetch_query(&self, query: &str) -> Result<Vec<RawFeedItem>> {
        let url = self.query_url(query)?;
        let body = get_text(&self.client, &url).await?;
        Self::parse(&body, query, Utc::now())
    }
}

#[async_trait]
impl Connector for GoogleNewsConnector {
    fn key(&self) -> &'static str {
        "google_news"
    }
    fn name(&self) -> &'static str {
        "Google News"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self) -> Vec<RawFeedItem> {
        let mut out = Vec::new();
        for q in &self.queries {
            match self.fetch_query(q).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => record_connector_error(self.key(), q, &e),
            }
        }
        counter!("feed_items_fetched_total", "source" => self.key()).increment(out.len() as u64);
        out
    }
}

// ---------------------------------------------------------------------------
// Dev.to
// ---------------------------------------------------------------------------

pub const DEVTO_FEED_URL: &str = "https://dev.to/feed/tag";
pub const DEVTO_TAGS: [&str; 5] = ["ai", "machinelearning", "llm", "automation", "agents"];
const DEVTO_TOTAL_CAP: usize = 15;

pub struct DevtoConnector {
    client: reqwest::Client,
    base_url: String,
    tags: Vec<String>,
}

impl DevtoConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEVTO_FEED_URL.to_string(),
            tags: DEVTO_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn mapping_for(tag: &str) -> RssMapping {
        RssMapping {
            id_prefix: "devto",
            source_name: "Dev.to".into(),
            per_feed: 5,
            max_content_chars: 1000,
            tags: vec!["Tutorial".into(), tag.to_uppercase()],
        }
    }

    pub fn parse(xml: &str, tag: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        parse_and_map(xml, &Self::mapping_for(tag), now)
    }

    async fn fetch_tag(&self, tag: &str) -> Result<Vec<RawFeedItem>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), tag);
        let body = get_text(&self.client, &url).await?;
        Self::parse(&body, tag, Utc::now())
    }
}

#[async_trait]
impl Connector for DevtoConnector {
    fn key(&self) -> &'static str {
        "devto"
    }
    fn name(&self) -> &'static str {
        "Dev.to"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch(&self) -> Vec<RawFeedItem> {
        let mut out = Vec::new();
        for tag in &self.tags {
            match self.fetch_tag(tag).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => record_connector_error(self.key(), tag, &e),
            }
        }
        out.truncate(DEVTO_TOTAL_CAP);
        counter!("feed_items_fetched_total", "source" => self.key()).increment(out.len() as u64);
        out
    }
}

// ---------------------------------------------------------------------------
// Official blogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BlogFeed {
    pub url: String,
    pub name: String,
}

pub fn default_blog_feeds() -> Vec<BlogFeed> {
    vec![
        BlogFeed {
            url: "https://openai.com/blog/rss/".into(),
            name: "OpenAI Blog".into(),
        },
        BlogFeed {
            url: "https://www.anthropic.com/news.rss".into(),
            name: "Anthropic News".into(),
        },
    ]
}

pub struct OfficialBlogsConnector {
    client: reqwest::Client,
    feeds: Vec<BlogFeed>,
}

impl OfficialBlogsConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            feeds: default_blog_feeds(),
        }
    }

    pub fn with_feeds(mut self, feeds: Vec<BlogFeed>) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn mapping_for(feed_name: &str) -> RssMapping {
        RssMapping {
            id_prefix: "blog",
            source_name: feed_name.to_string(),
            per_feed: 10,
            max_content_chars: 2000,
            tags: vec!["Official".into(), "AI News".into()],
        }
    }

    pub fn parse(xml: &str, feed_name: &str, now: DateTime<Utc>) -> Result<Vec<RawFeedItem>> {
        parse_and_map(xml, &Self::mapping_for(feed_name), now)
    }

    async fn fetch_feed(&self, feed: &BlogFeed) -> Result<Vec<RawFeedItem>> {
        let body = get_text(&self.client, &feed.url).await?;
        Self::parse(&body, &feed.name, Utc::now())
    }
}

#[async_trait]
impl Connector for OfficialBlogsConnector {
    fn key(&self) -> &'static str {
        "official_blogs"
    }
    fn name(&self) -> &'static str {
        "AI Company Blogs"
    }
    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }
    fn base_url(&self) -> String {
        self.feeds.first().map(|f| f.url.clone()).unwrap_or_default()
    }

    /// One row per blog; each carries its own display name.
    fn catalog(&self) -> Vec<FeedSource> {
        self.feeds
            .iter()
            .map(|f| FeedSource {
                name: f.name.clone(),
                source_type: SourceType::Rss,
                url: f.url.clone(),
                is_active: true,
                fetch_interval_hours: 24,
                credibility_weight: self.credibility_weight(),
            })
            .collect()
    }

    async fn fetch(&self) -> Vec<RawFeedItem> {
        let mut out = Vec::new();
        for feed in &self.feeds {
            match self.fetch_feed(feed).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => record_connector_error(self.key(), &feed.name, &e),
            }
        }
        counter!("feed_items_fetched_total", "source" => self.key()).increment(out.len() as u64);
        out
    }
}
