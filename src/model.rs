// src/model.rs
//! Domain types shared by connectors, the processor, the ranker and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin family of a feed item. Closed set; `Unknown` only appears for
/// ad-hoc items submitted through the processing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Arxiv,
    Github,
    Hackernews,
    Rss,
    #[serde(other)]
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::Github => "github",
            SourceType::Hackernews => "hackernews",
            SourceType::Rss => "rss",
            SourceType::Unknown => "unknown",
        }
    }

    /// Lenient parse used for stored rows and query params.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "arxiv" => SourceType::Arxiv,
            "github" => SourceType::Github,
            "hackernews" => SourceType::Hackernews,
            "rss" => SourceType::Rss,
            _ => SourceType::Unknown,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed content taxonomy. Declaration order is the classifier's tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Research,
    Tooling,
    Tutorial,
    News,
    #[serde(rename = "AI Insight")]
    AiInsight,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Research,
        ContentType::Tooling,
        ContentType::Tutorial,
        ContentType::News,
        ContentType::AiInsight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Research => "Research",
            ContentType::Tooling => "Tooling",
            ContentType::Tutorial => "Tutorial",
            ContentType::News => "News",
            ContentType::AiInsight => "AI Insight",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Research => "Research Papers",
            ContentType::Tooling => "Tools & Libraries",
            ContentType::Tutorial => "Tutorials & Guides",
            ContentType::News => "Industry News",
            ContentType::AiInsight => "AI Insights",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connector output, normalized into a common shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeedItem {
    /// Stable per origin record, e.g. `arxiv_2401.01234v1`.
    pub source_id: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Raw item plus everything the content processor derives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedItem {
    pub raw: RawFeedItem,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub practical_takeaways: Vec<String>,
    pub why_it_matters: String,
    pub content_type: ContentType,
    pub relevance_score: f64,
    pub credibility_score: f64,
    /// Only set by the ranker.
    pub combined_score: Option<f64>,
    pub processed_at: DateTime<Utc>,
}

/// Persisted post. `source_id` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePost {
    pub id: i64,
    pub source_id: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub source_url: String,
    pub title: String,
    pub original_content: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub practical_takeaways: Vec<String>,
    pub why_it_matters: String,
    pub content_type: ContentType,
    pub tags: Vec<String>,
    pub relevance_score: f64,
    pub credibility_score: f64,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub is_published: bool,
    pub is_featured: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a post; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub source_id: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub source_url: String,
    pub title: String,
    pub original_content: String,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub practical_takeaways: Vec<String>,
    pub why_it_matters: String,
    pub content_type: ContentType,
    pub tags: Vec<String>,
    pub relevance_score: f64,
    pub credibility_score: f64,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// Titles longer than this are cut before persisting.
pub const MAX_TITLE_CHARS: usize = 500;

impl From<ProcessedItem> for NewPost {
    fn from(p: ProcessedItem) -> Self {
        let title = if p.raw.title.chars().count() > MAX_TITLE_CHARS {
            p.raw.title.chars().take(MAX_TITLE_CHARS).collect()
        } else {
            p.raw.title
        };
        Self {
            source_id: p.raw.source_id,
            source_type: p.raw.source_type,
            source_name: p.raw.source_name,
            source_url: p.raw.source_url,
            title,
            original_content: p.raw.content,
            summary: p.summary,
            key_insights: p.key_insights,
            practical_takeaways: p.practical_takeaways,
            why_it_matters: p.why_it_matters,
            content_type: p.content_type,
            tags: p.raw.tags,
            relevance_score: p.relevance_score,
            credibility_score: p.credibility_score,
            author: p.raw.author,
            published_at: p.raw.published_at,
            processed_at: p.processed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(RunStatus::InProgress),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One row per orchestrator invocation. Terminal once `completed_at` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRunLog {
    pub id: i64,
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub items_fetched: i64,
    pub items_processed: i64,
    pub items_published: i64,
    pub error_message: Option<String>,
}

/// Final state written by the run that owns the log row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCompletion {
    pub completed_at: DateTime<Utc>,
    pub status: RunStatus,
    pub items_fetched: i64,
    pub items_processed: i64,
    pub items_published: i64,
    pub error_message: Option<String>,
}

/// Static per-source configuration row. Informational; the registry is code-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub source_type: SourceType,
    pub url: String,
    pub is_active: bool,
    pub fetch_interval_hours: i64,
    pub credibility_weight: f64,
}

/// Read-side filter for the posts listing.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub since: Option<DateTime<Utc>>,
    pub content_type: Option<ContentType>,
    pub tag: Option<String>,
    pub source_type: Option<SourceType>,
    /// Literal substring of title or summary; case folding is ASCII only.
    pub search: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl PostQuery {
    /// In-memory predicate mirroring the SQL filter.
    pub fn matches(&self, p: &KnowledgePost) -> bool {
        if !p.is_published {
            return false;
        }
        if let Some(since) = self.since {
            if p.created_at < since {
                return false;
            }
        }
        if let Some(ct) = self.content_type {
            if p.content_type != ct {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !p.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(st) = self.source_type {
            if p.source_type != st {
                return false;
            }
        }
        if let Some(q) = &self.search {
            let q = q.to_ascii_lowercase();
            if !p.title.to_ascii_lowercase().contains(&q)
                && !p.summary.to_ascii_lowercase().contains(&q)
            {
                return false;
            }
        }
        true
    }
}
