// src/ingest/dedup.rs
//! Batch deduplication against persisted `source_id`s and within the batch.
//!
//! Checks, in order, per item:
//! 1) `source_id` already persisted
//! 2) `source_id` already accepted in this batch
//! 3) normalized title key already accepted in this batch
//!
//! The title key is lossy (lowercase, word chars only, collapsed spaces, first 50
//! chars); it only catches syndicated copies of the same story. First seen wins.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::model::RawFeedItem;

const TITLE_KEY_CHARS: usize = 50;

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = RE_NON_WORD.replace_all(&lower, "");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    collapsed.trim().chars().take(TITLE_KEY_CHARS).collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub existing: usize,
    pub batch_id: usize,
    pub title: usize,
}

impl DedupStats {
    pub fn dropped(&self) -> usize {
        self.existing + self.batch_id + self.title
    }
}

/// Order-preserving filter; returns the accepted items and per-reason drop counts.
pub fn dedup_batch(
    items: Vec<RawFeedItem>,
    existing_ids: &HashSet<String>,
) -> (Vec<RawFeedItem>, DedupStats) {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut stats = DedupStats::default();
    let mut keep = Vec::with_capacity(items.len());

    for it in items {
        if existing_ids.contains(&it.source_id) {
            stats.existing += 1;
            continue;
        }
        if seen_ids.contains(&it.source_id) {
            stats.batch_id += 1;
            continue;
        }
        let key = normalize_title(&it.title);
        if seen_titles.contains(&key) {
            stats.title += 1;
            continue;
        }
        seen_ids.insert(it.source_id.clone());
        seen_titles.insert(key);
        keep.push(it);
    }

    counter!("feed_dedup_dropped_total", "reason" => "existing").increment(stats.existing as u64);
    counter!("feed_dedup_dropped_total", "reason" => "batch_id").increment(stats.batch_id as u64);
    counter!("feed_dedup_dropped_total", "reason" => "title").increment(stats.title as u64);

    (keep, stats)
}
