// src/store/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{sort_tag_counts, FeedStore, StoreError, TagCount};
use crate::model::{
    FeedSource, FetchRunLog, KnowledgePost, NewPost, PostQuery, RunCompletion, RunStatus,
};

#[derive(Default)]
struct Inner {
    posts: Vec<KnowledgePost>,
    runs: Vec<FetchRunLog>,
    sources: Vec<FeedSource>,
    next_post_id: i64,
    next_run_id: i64,
}

/// Process-local store with the same uniqueness and ordering rules as SQLite.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl FeedStore for InMemoryStore {
    async fn existing_source_ids(&self) -> Result<HashSet<String>, StoreError> {
        let g = self.lock()?;
        Ok(g.posts.iter().map(|p| p.source_id.clone()).collect())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<KnowledgePost, StoreError> {
        let mut g = self.lock()?;
        if g.posts.iter().any(|p| p.source_id == post.source_id) {
            return Err(StoreError::Duplicate(post.source_id.clone()));
        }
        g.next_post_id += 1;
        let now = Utc::now();
        let row = KnowledgePost {
            id: g.next_post_id,
            source_id: post.source_id.clone(),
            source_type: post.source_type,
            source_name: post.source_name.clone(),
            source_url: post.source_url.clone(),
            title: post.title.clone(),
            original_content: post.original_content.clone(),
            summary: post.summary.clone(),
            key_insights: post.key_insights.clone(),
            practical_takeaways: post.practical_takeaways.clone(),
            why_it_matters: post.why_it_matters.clone(),
            content_type: post.content_type,
            tags: post.tags.clone(),
            relevance_score: post.relevance_score,
            credibility_score: post.credibility_score,
            author: post.author.clone(),
            published_at: post.published_at,
            processed_at: post.processed_at,
            is_published: true,
            is_featured: false,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        g.posts.push(row.clone());
        Ok(row)
    }

    async fn get_post(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        let g = self.lock()?;
        Ok(g.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn record_view(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        let mut g = self.lock()?;
        let Some(p) = g.posts.iter_mut().find(|p| p.id == id && p.is_published) else {
            return Ok(None);
        };
        p.view_count += 1;
        Ok(Some(p.clone()))
    }

    async fn list_posts(&self, q: &PostQuery) -> Result<(Vec<KnowledgePost>, usize), StoreError> {
        let g = self.lock()?;
        let mut hits: Vec<&KnowledgePost> = g.posts.iter().filter(|p| q.matches(p)).collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = hits.len();
        let page = hits
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn count_published_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let g = self.lock()?;
        Ok(g.posts
            .iter()
            .filter(|p| p.is_published && since.map_or(true, |s| p.created_at >= s))
            .count() as i64)
    }

    async fn tag_counts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TagCount>, StoreError> {
        let g = self.lock()?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for p in g.posts.iter().filter(|p| p.is_published && p.created_at >= since) {
            for t in &p.tags {
                *counts.entry(t.clone()).or_default() += 1;
            }
        }
        let v = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        Ok(sort_tag_counts(v, limit))
    }

    async fn start_run(
        &self,
        source_name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchRunLog, StoreError> {
        let mut g = self.lock()?;
        g.next_run_id += 1;
        let log = FetchRunLog {
            id: g.next_run_id,
            source_name: source_name.to_string(),
            started_at,
            completed_at: None,
            status: RunStatus::InProgress,
            items_fetched: 0,
            items_processed: 0,
            items_published: 0,
            error_message: None,
        };
        g.runs.push(log.clone());
        Ok(log)
    }

    async fn finish_run(&self, id: i64, done: &RunCompletion) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        let log = g
            .runs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("run log {id}")))?;
        log.completed_at = Some(done.completed_at);
        log.status = done.status;
        log.items_fetched = done.items_fetched;
        log.items_processed = done.items_processed;
        log.items_published = done.items_published;
        log.error_message = done.error_message.clone();
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<FetchRunLog>, StoreError> {
        let g = self.lock()?;
        let mut v = g.runs.clone();
        v.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        v.truncate(limit);
        Ok(v)
    }

    async fn last_successful_run(&self) -> Result<Option<FetchRunLog>, StoreError> {
        let g = self.lock()?;
        Ok(g.runs
            .iter()
            .filter(|l| l.status == RunStatus::Success && l.completed_at.is_some())
            .max_by_key(|l| (l.completed_at, l.id))
            .cloned())
    }

    async fn upsert_sources(&self, sources: &[FeedSource]) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        for s in sources {
            match g.sources.iter_mut().find(|x| x.name == s.name) {
                Some(existing) => *existing = s.clone(),
                None => g.sources.push(s.clone()),
            }
        }
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<FeedSource>, StoreError> {
        let g = self.lock()?;
        Ok(g.sources.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, SourceType};

    fn new_post(id: &str, tags: &[&str]) -> NewPost {
        NewPost {
            source_id: id.into(),
            source_type: SourceType::Arxiv,
            source_name: "ArXiv".into(),
            source_url: format!("https://arxiv.org/abs/{id}"),
            title: format!("Paper {id}"),
            original_content: "abstract".into(),
            summary: "summary".into(),
            key_insights: vec![],
            practical_takeaways: vec![],
            why_it_matters: "This matters.".into(),
            content_type: ContentType::Research,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            relevance_score: 0.5,
            credibility_score: 0.9,
            author: None,
            published_at: Utc::now(),
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_source_id_is_rejected() {
        let s = InMemoryStore::new();
        let first = s.insert_post(&new_post("a", &[])).await.unwrap();
        assert_eq!(first.id, 1);
        assert!(matches!(
            s.insert_post(&new_post("a", &[])).await,
            Err(StoreError::Duplicate(id)) if id == "a"
        ));
        assert_eq!(s.existing_source_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_view_increments_and_misses_are_none() {
        let s = InMemoryStore::new();
        let p = s.insert_post(&new_post("a", &[])).await.unwrap();
        s.record_view(p.id).await.unwrap();
        let p2 = s.record_view(p.id).await.unwrap().unwrap();
        assert_eq!(p2.view_count, 2);
        assert!(s.record_view(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tag_counts_and_stats() {
        let s = InMemoryStore::new();
        s.insert_post(&new_post("a", &["AI", "RAG"])).await.unwrap();
        s.insert_post(&new_post("b", &["AI"])).await.unwrap();
        let week_ago = Utc::now() - chrono::Duration::days(7);
        let tags = s.tag_counts(week_ago, 10).await.unwrap();
        assert_eq!(tags[0], TagCount { tag: "AI".into(), count: 2 });

        let stats = s.stats(Utc::now()).await.unwrap();
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.week_posts, 2);
        assert!(stats.last_fetch.is_none());
    }
}
