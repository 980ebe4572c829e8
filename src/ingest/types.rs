// src/ingest/types.rs
use async_trait::async_trait;

use crate::analyze::rules::default_base_credibility;
use crate::model::{FeedSource, RawFeedItem, SourceType};

/// One external source family.
///
/// `fetch` never fails: sub-query errors are logged and skipped, a total wipeout
/// yields an empty list.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Registry key, e.g. `"arxiv"`.
    fn key(&self) -> &'static str;
    /// Display name stamped on items.
    fn name(&self) -> &'static str;
    fn source_type(&self) -> SourceType;
    fn base_url(&self) -> String;

    /// Fixed per-source-type prior; the processor uses it as the credibility base.
    fn credibility_weight(&self) -> f64 {
        default_base_credibility(self.source_type())
    }

    /// Rows describing this connector for the `feed_sources` table.
    fn catalog(&self) -> Vec<FeedSource> {
        vec![FeedSource {
            name: self.name().to_string(),
            source_type: self.source_type(),
            url: self.base_url(),
            is_active: true,
            fetch_interval_hours: 24,
            credibility_weight: self.credibility_weight(),
        }]
    }

    async fn fetch(&self) -> Vec<RawFeedItem>;
}
