// src/analyze/rank.rs
//! Ranking: relevance filter, weighted blend with credibility, stable sort, daily cap.
//!
//! - Items with `relevance_score < min_relevance` are dropped.
//! - `combined = relevance_weight * relevance + credibility_weight * credibility`.
//! - Sort is descending and stable, so equal scores keep filter order.
//! - Only the first `max_items` survive.

use std::cmp::Ordering;

use crate::config::PipelineConfig;
use crate::model::ProcessedItem;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankParams {
    pub min_relevance: f64,
    pub max_items: usize,
    pub relevance_weight: f64,
    pub credibility_weight: f64,
}

impl Default for RankParams {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RankParams {
    fn from(p: &PipelineConfig) -> Self {
        Self {
            min_relevance: p.min_relevance,
            max_items: p.max_posts_per_day,
            relevance_weight: p.relevance_weight,
            credibility_weight: p.credibility_weight,
        }
    }
}

pub fn combined_score(relevance: f64, credibility: f64, params: &RankParams) -> f64 {
    params.relevance_weight * relevance + params.credibility_weight * credibility
}

/// Returns the selected items with `combined_score` set, best first.
pub fn rank_and_select(items: Vec<ProcessedItem>, params: &RankParams) -> Vec<ProcessedItem> {
    let mut kept: Vec<ProcessedItem> = items
        .into_iter()
        .filter(|it| it.relevance_score >= params.min_relevance)
        .map(|mut it| {
            it.combined_score = Some(combined_score(
                it.relevance_score,
                it.credibility_score,
                params,
            ));
            it
        })
        .collect();

    // sort_by is stable
    kept.sort_by(|a, b| {
        let (a, b) = (a.combined_score.unwrap_or(0.0), b.combined_score.unwrap_or(0.0));
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
    kept.truncate(params.max_items);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, RawFeedItem, SourceType};
    use chrono::Utc;

    fn item(id: &str, relevance: f64, credibility: f64) -> ProcessedItem {
        ProcessedItem {
            raw: RawFeedItem {
                source_id: id.into(),
                source_type: SourceType::Rss,
                source_name: "Test".into(),
                source_url: String::new(),
                title: id.into(),
                content: String::new(),
                author: None,
                published_at: Utc::now(),
                tags: vec![],
            },
            summary: String::new(),
            key_insights: vec![],
            practical_takeaways: vec![],
            why_it_matters: String::new(),
            content_type: ContentType::News,
            relevance_score: relevance,
            credibility_score: credibility,
            combined_score: None,
            processed_at: Utc::now(),
        }
    }

    fn ids(v: &[ProcessedItem]) -> Vec<&str> {
        v.iter().map(|p| p.raw.source_id.as_str()).collect()
    }

    #[test]
    fn combined_score_uses_configured_weights() {
        let s = combined_score(0.8, 0.9, &RankParams::default());
        assert!((s - 0.84).abs() < 1e-9);
    }

    #[test]
    fn filters_below_threshold_and_sorts_desc() {
        let out = rank_and_select(
            vec![item("low", 0.25, 1.0), item("a", 0.4, 0.6), item("b", 0.9, 0.9)],
            &RankParams::default(),
        );
        assert_eq!(ids(&out), vec!["b", "a"]);
        assert!(out.iter().all(|p| p.combined_score.is_some()));
    }

    #[test]
    fn threshold_is_inclusive_and_ties_keep_input_order() {
        let out = rank_and_select(
            vec![item("first", 0.3, 0.6), item("second", 0.3, 0.6)],
            &RankParams::default(),
        );
        assert_eq!(ids(&out), vec!["first", "second"]);
    }

    #[test]
    fn truncates_to_daily_cap() {
        let params = RankParams {
            max_items: 2,
            ..RankParams::default()
        };
        let items = (0..5).map(|i| item(&format!("i{i}"), 0.5 + i as f64 * 0.1, 0.6)).collect();
        let out = rank_and_select(items, &params);
        assert_eq!(ids(&out), vec!["i4", "i3"]);
    }
}
