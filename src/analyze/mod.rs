// src/analyze/mod.rs
//! Content processor: turns a `RawFeedItem` into a `ProcessedItem`.
//!
//! Stages run against the same cleaned text (`"{title}. {content}"`):
//! 1) summary
//! 2) key insights
//! 3) practical takeaways
//! 4) why it matters
//! 5) content type
//! 6) tags
//! 7) relevance
//! 8) credibility
//!
//! Everything is driven by a `RuleTable`; no I/O, no shared mutable state besides a counter.

pub mod classify;
pub mod rank;
pub mod rules;
pub mod scoring;
pub mod summary;
pub mod takeaways;
pub mod text;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use metrics::counter;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{ProcessedItem, RawFeedItem};

pub use crate::analyze::rank::{combined_score, rank_and_select, RankParams};
pub use crate::analyze::rules::{RuleTable, RULES_VERSION};

#[derive(Debug)]
pub struct ContentProcessor {
    rules: RuleTable,
    insight_patterns: Vec<Regex>,
    processed: AtomicU64,
}

impl ContentProcessor {
    /// Compiles the insight patterns; a bad regex in an override table is an error here.
    pub fn new(rules: RuleTable) -> Result<Self> {
        let insight_patterns = rules
            .insights
            .patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("compiling insight pattern {p:?}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            insight_patterns,
            processed: AtomicU64::new(0),
        })
    }

    pub fn with_default_rules() -> Result<Self> {
        Self::new(RuleTable::default_seed())
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Items processed by this instance so far.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn process(&self, item: RawFeedItem) -> Result<ProcessedItem> {
        let text = text::combined_text(&item.title, &item.content);
        // combined_text always contains the ". " joiner; anything shorter is empty input
        if text.trim_matches(|c: char| c == '.' || c.is_whitespace()).is_empty() {
            return Err(anyhow!("item {} has no usable text", item.source_id));
        }
        let lower = text.to_lowercase();
        let r = &self.rules;

        let summary = summary::summarize(&text, &r.summary);
        let key_insights = summary::extract_insights(&text, &self.insight_patterns, &r.insights);
        let practical_takeaways =
            takeaways::practical_takeaways(&lower, item.source_type, &r.takeaways);
        let why_it_matters = takeaways::why_it_matters(&lower, item.source_type, &r.importance);
        let content_type = classify::classify(&lower, item.source_type, &r.content_types);
        let tags = classify::generate_tags(&lower, &item.tags, &r.tags);
        let relevance_score = scoring::relevance_score(&lower, &r.relevance);
        let credibility_score =
            scoring::credibility_score(item.source_type, &item.source_name, &r.credibility);

        if !relevance_score.is_finite() || !credibility_score.is_finite() {
            return Err(anyhow!("non-finite score for item {}", item.source_id));
        }

        self.processed.fetch_add(1, Ordering::Relaxed);

        Ok(ProcessedItem {
            raw: RawFeedItem { tags, ..item },
            summary,
            key_insights,
            practical_takeaways,
            why_it_matters,
            content_type,
            relevance_score,
            credibility_score,
            combined_score: None,
            processed_at: Utc::now(),
        })
    }

    /// Per-item failures are logged and dropped; order of survivors is preserved.
    pub fn process_batch(&self, items: Vec<RawFeedItem>) -> Vec<ProcessedItem> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let source_id = item.source_id.clone();
            match self.process(item) {
                Ok(p) => {
                    counter!("feed_items_processed_total").increment(1);
                    out.push(p);
                }
                Err(e) => {
                    counter!("feed_process_errors_total").increment(1);
                    tracing::warn!(target: "ingest", error = %e, source_id = %source_id, "dropping item that failed processing");
                }
            }
        }
        out
    }
}
