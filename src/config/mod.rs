// src/config/mod.rs
//! Feed configuration: TOML file plus a handful of env overrides.
//!
//! Resolution order:
//! 1) `$FEED_CONFIG_PATH` (must exist)
//! 2) `config/feed.toml` (optional; built-in defaults when absent)
//! 3) env overrides on top (`DATABASE_URL`, `FEED_MIN_RELEVANCE`, ...)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyze::rules::RuleTable;

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_MIN_RELEVANCE: &str = "FEED_MIN_RELEVANCE";
const ENV_MAX_POSTS: &str = "FEED_MAX_POSTS_PER_DAY";
const ENV_REFETCH_HOURS: &str = "FEED_REFETCH_AFTER_HOURS";
const ENV_SCHEDULE_SECS: &str = "FEED_SCHEDULE_INTERVAL_SECS";

/// Upper bound for `pipeline.refetch_after_hours` (one year).
pub const MAX_REFETCH_AFTER_HOURS: i64 = 24 * 365;

/// Connector keys known to the registry, in registration order.
pub const ALL_SOURCE_KEYS: [&str; 6] = [
    "google_news",
    "arxiv",
    "hackernews",
    "devto",
    "github",
    "official_blogs",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Optional TOML rule table replacing the built-in one.
    pub rules_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_relevance: f64,
    pub max_posts_per_day: usize,
    /// Informational only; never enforced as a floor.
    pub min_posts_per_day: usize,
    pub refetch_after_hours: i64,
    pub relevance_weight: f64,
    pub credibility_weight: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_relevance: 0.3,
            max_posts_per_day: 10,
            min_posts_per_day: 5,
            refetch_after_hours: 20,
            relevance_weight: 0.6,
            credibility_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub github_delay_ms: u64,
    pub hackernews_concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("ai-knowledge-feed/", env!("CARGO_PKG_VERSION")).to_string(),
            github_delay_ms: 1000,
            hackernews_concurrency: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub enabled: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: ALL_SOURCE_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourcesConfig {
    pub fn is_enabled(&self, key: &str) -> bool {
        self.enabled.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/ai_feed.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            enabled: true,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            pipeline: PipelineConfig::default(),
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: FeedConfig = toml::from_str(s).context("parsing feed config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// File (env path or default location) plus env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            Self::load_from(&pb)?
        } else {
            let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
            if pb.exists() {
                Self::load_from(&pb)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(ENV_DATABASE_URL) {
            self.storage.database_url = url;
        }
        if let Some(v) = parse_unit_env(ENV_MIN_RELEVANCE, std::env::var(ENV_MIN_RELEVANCE).ok()) {
            self.pipeline.min_relevance = v;
        }
        if let Some(v) = parse_env::<usize>(ENV_MAX_POSTS) {
            self.pipeline.max_posts_per_day = v;
        }
        if let Some(v) = parse_env::<i64>(ENV_REFETCH_HOURS) {
            self.pipeline.refetch_after_hours = v;
        }
        if let Some(v) = parse_env::<u64>(ENV_SCHEDULE_SECS) {
            self.scheduler.interval_secs = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.min_relevance) {
            return Err(anyhow!("pipeline.min_relevance must be within [0, 1]"));
        }
        if p.max_posts_per_day == 0 {
            return Err(anyhow!("pipeline.max_posts_per_day must be positive"));
        }
        if !(0..=MAX_REFETCH_AFTER_HOURS).contains(&p.refetch_after_hours) {
            return Err(anyhow!(
                "pipeline.refetch_after_hours must be between 0 and {MAX_REFETCH_AFTER_HOURS}"
            ));
        }
        if !p.relevance_weight.is_finite() || !p.credibility_weight.is_finite() {
            return Err(anyhow!("pipeline weights must be finite"));
        }
        if self.http.hackernews_concurrency == 0 {
            return Err(anyhow!("http.hackernews_concurrency must be positive"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(anyhow!("scheduler.interval_secs must be positive"));
        }
        if let Some(unknown) = self
            .sources
            .enabled
            .iter()
            .find(|k| !ALL_SOURCE_KEYS.iter().any(|a| a.eq_ignore_ascii_case(k)))
        {
            return Err(anyhow!("unknown source key in sources.enabled: {unknown}"));
        }
        Ok(())
    }

    /// Built-in rule table unless `rules_path` points elsewhere.
    pub fn rule_table(&self) -> Result<RuleTable> {
        match &self.rules_path {
            Some(p) => RuleTable::load_from_file(p),
            None => Ok(RuleTable::default_seed()),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_env(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_unit_env(key: &str, raw: Option<String>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v.clamp(0.0, 1.0)),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}
