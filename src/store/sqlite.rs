// src/store/sqlite.rs
//! SQLite store on sqlx.
//!
//! Schema is created idempotently at connect. Timestamps are stored as fixed-width
//! RFC 3339 UTC strings (microseconds, `Z`), so text comparison orders them; list
//! columns are JSON arrays.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::{sort_tag_counts, FeedStore, StoreError, TagCount};
use crate::model::{
    ContentType, FeedSource, FetchRunLog, KnowledgePost, NewPost, PostQuery, RunCompletion,
    RunStatus, SourceType,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id TEXT NOT NULL,
        source_type TEXT NOT NULL,
        source_name TEXT NOT NULL,
        source_url TEXT NOT NULL,
        title TEXT NOT NULL,
        original_content TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        key_insights TEXT NOT NULL DEFAULT '[]',
        practical_takeaways TEXT NOT NULL DEFAULT '[]',
        why_it_matters TEXT NOT NULL DEFAULT '',
        content_type TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        relevance_score REAL NOT NULL,
        credibility_score REAL NOT NULL,
        author TEXT,
        published_at TEXT NOT NULL,
        processed_at TEXT NOT NULL,
        is_published INTEGER NOT NULL DEFAULT 1,
        is_featured INTEGER NOT NULL DEFAULT 0,
        view_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_knowledge_posts_source_id ON knowledge_posts(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_knowledge_posts_created_at ON knowledge_posts(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS feed_sources (
        name TEXT PRIMARY KEY,
        source_type TEXT NOT NULL,
        url TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        fetch_interval_hours INTEGER NOT NULL DEFAULT 24,
        credibility_weight REAL NOT NULL DEFAULT 0.5,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feed_fetch_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_name TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        status TEXT NOT NULL,
        items_fetched INTEGER NOT NULL DEFAULT 0,
        items_processed INTEGER NOT NULL DEFAULT 0,
        items_published INTEGER NOT NULL DEFAULT 0,
        error_message TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feed_fetch_logs_status ON feed_fetch_logs(status, completed_at)",
];

const POST_COLUMNS: &str = "id, source_id, source_type, source_name, source_url, title, \
    original_content, summary, key_insights, practical_takeaways, why_it_matters, content_type, \
    tags, relevance_score, credibility_score, author, published_at, processed_at, is_published, \
    is_featured, view_count, created_at, updated_at";

const LOG_COLUMNS: &str = "id, source_name, started_at, completed_at, status, items_fetched, \
    items_processed, items_published, error_message";

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connect (creating the file and its directory when needed) and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        if let Some(dir) = opts.get_filename().parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::Unavailable(format!("creating {}: {e}", dir.display()))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!(target: "store", url = %database_url, "sqlite store ready");
        Ok(store)
    }

    /// Private in-memory database; one connection so every query sees the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_post(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM knowledge_posts WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_post).transpose()
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

fn list_from_json(raw: &str) -> Result<Vec<String>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn row_to_post(row: &SqliteRow) -> Result<KnowledgePost, StoreError> {
    let content_type: String = row.try_get("content_type")?;
    Ok(KnowledgePost {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        source_type: SourceType::parse(&row.try_get::<String, _>("source_type")?),
        source_name: row.try_get("source_name")?,
        source_url: row.try_get("source_url")?,
        title: row.try_get("title")?,
        original_content: row.try_get("original_content")?,
        summary: row.try_get("summary")?,
        key_insights: list_from_json(&row.try_get::<String, _>("key_insights")?)?,
        practical_takeaways: list_from_json(&row.try_get::<String, _>("practical_takeaways")?)?,
        why_it_matters: row.try_get("why_it_matters")?,
        content_type: ContentType::parse(&content_type)
            .ok_or_else(|| StoreError::Corrupt(format!("content_type {content_type:?}")))?,
        tags: list_from_json(&row.try_get::<String, _>("tags")?)?,
        relevance_score: row.try_get("relevance_score")?,
        credibility_score: row.try_get("credibility_score")?,
        author: row.try_get("author")?,
        published_at: parse_ts(&row.try_get::<String, _>("published_at")?)?,
        processed_at: parse_ts(&row.try_get::<String, _>("processed_at")?)?,
        is_published: row.try_get("is_published")?,
        is_featured: row.try_get("is_featured")?,
        view_count: row.try_get("view_count")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn row_to_log(row: &SqliteRow) -> Result<FetchRunLog, StoreError> {
    let status: String = row.try_get("status")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    Ok(FetchRunLog {
        id: row.try_get("id")?,
        source_name: row.try_get("source_name")?,
        started_at: parse_ts(&row.try_get::<String, _>("started_at")?)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
        status: RunStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("run status {status:?}")))?,
        items_fetched: row.try_get("items_fetched")?,
        items_processed: row.try_get("items_processed")?,
        items_published: row.try_get("items_published")?,
        error_message: row.try_get("error_message")?,
    })
}

fn row_to_source(row: &SqliteRow) -> Result<FeedSource, StoreError> {
    Ok(FeedSource {
        name: row.try_get("name")?,
        source_type: SourceType::parse(&row.try_get::<String, _>("source_type")?),
        url: row.try_get("url")?,
        is_active: row.try_get("is_active")?,
        fetch_interval_hours: row.try_get("fetch_interval_hours")?,
        credibility_weight: row.try_get("credibility_weight")?,
    })
}

/// Appends the `PostQuery` predicates after a `WHERE is_published = 1`.
fn push_post_filters(qb: &mut QueryBuilder<'_, Sqlite>, q: &PostQuery) {
    if let Some(since) = q.since {
        qb.push(" AND created_at >= ").push_bind(ts(since));
    }
    if let Some(ct) = q.content_type {
        qb.push(" AND content_type = ").push_bind(ct.as_str().to_string());
    }
    if let Some(tag) = &q.tag {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(knowledge_posts.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
    if let Some(st) = q.source_type {
        qb.push(" AND source_type = ").push_bind(st.as_str().to_string());
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{}%", escape_like(&search.to_ascii_lowercase()));
        qb.push(" AND (lower(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR lower(summary) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// `%` and `_` match literally; `\` is the escape character.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl FeedStore for SqliteStore {
    async fn existing_source_ids(&self) -> Result<HashSet<String>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT source_id FROM knowledge_posts")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<KnowledgePost, StoreError> {
        let now = ts(Utc::now());
        let res = sqlx::query(
            r#"
            INSERT INTO knowledge_posts (
                source_id, source_type, source_name, source_url, title, original_content,
                summary, key_insights, practical_takeaways, why_it_matters, content_type, tags,
                relevance_score, credibility_score, author, published_at, processed_at,
                is_published, is_featured, view_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, 0, ?, ?)
            "#,
        )
        .bind(&post.source_id)
        .bind(post.source_type.as_str())
        .bind(&post.source_name)
        .bind(&post.source_url)
        .bind(&post.title)
        .bind(&post.original_content)
        .bind(&post.summary)
        .bind(serde_json::to_string(&post.key_insights)?)
        .bind(serde_json::to_string(&post.practical_takeaways)?)
        .bind(&post.why_it_matters)
        .bind(post.content_type.as_str())
        .bind(serde_json::to_string(&post.tags)?)
        .bind(post.relevance_score)
        .bind(post.credibility_score)
        .bind(&post.author)
        .bind(ts(post.published_at))
        .bind(ts(post.processed_at))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        let id = match res {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::Duplicate(post.source_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        self.fetch_post(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {id} after insert")))
    }

    async fn get_post(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        self.fetch_post(id).await
    }

    async fn record_view(&self, id: i64) -> Result<Option<KnowledgePost>, StoreError> {
        let done = sqlx::query(
            "UPDATE knowledge_posts SET view_count = view_count + 1 WHERE id = ? AND is_published = 1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(id).await
    }

    async fn list_posts(&self, q: &PostQuery) -> Result<(Vec<KnowledgePost>, usize), StoreError> {
        let mut count_qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM knowledge_posts WHERE is_published = 1");
        push_post_filters(&mut count_qb, q);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM knowledge_posts WHERE is_published = 1"
        ));
        push_post_filters(&mut qb, q);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(q.limit as i64)
            .push(" OFFSET ")
            .push_bind(q.offset as i64);
        let rows = qb.build().fetch_all(&self.pool).await?;
        let posts = rows.iter().map(row_to_post).collect::<Result<Vec<_>, _>>()?;
        Ok((posts, total.max(0) as usize))
    }

    async fn count_published_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let n: i64 = match since {
            Some(s) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM knowledge_posts WHERE is_published = 1 AND created_at >= ?",
                )
                .bind(ts(s))
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_posts WHERE is_published = 1")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(n)
    }

    async fn tag_counts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TagCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT j.value AS tag, COUNT(*) AS n
            FROM knowledge_posts p, json_each(p.tags) j
            WHERE p.is_published = 1 AND p.created_at >= ?
            GROUP BY j.value
            "#,
        )
        .bind(ts(since))
        .fetch_all(&self.pool)
        .await?;
        let v = rows
            .iter()
            .map(|r| {
                Ok(TagCount {
                    tag: r.try_get("tag")?,
                    count: r.try_get("n")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(sort_tag_counts(v, limit))
    }

    async fn start_run(
        &self,
        source_name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchRunLog, StoreError> {
        let done = sqlx::query(
            "INSERT INTO feed_fetch_logs (source_name, started_at, status) VALUES (?, ?, ?)",
        )
        .bind(source_name)
        .bind(ts(started_at))
        .bind(RunStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        let id = done.last_insert_rowid();
        let sql = format!("SELECT {LOG_COLUMNS} FROM feed_fetch_logs WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_one(&self.pool).await?;
        row_to_log(&row)
    }

    async fn finish_run(&self, id: i64, done: &RunCompletion) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE feed_fetch_logs
            SET completed_at = ?, status = ?, items_fetched = ?, items_processed = ?,
                items_published = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(ts(done.completed_at))
        .bind(done.status.as_str())
        .bind(done.items_fetched)
        .bind(done.items_processed)
        .bind(done.items_published)
        .bind(&done.error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("run log {id}")));
        }
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<FetchRunLog>, StoreError> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM feed_fetch_logs ORDER BY started_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_log).collect()
    }

    async fn last_successful_run(&self) -> Result<Option<FetchRunLog>, StoreError> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM feed_fetch_logs \
             WHERE status = ? AND completed_at IS NOT NULL \
             ORDER BY completed_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(RunStatus::Success.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_log).transpose()
    }

    async fn upsert_sources(&self, sources: &[FeedSource]) -> Result<(), StoreError> {
        let now = ts(Utc::now());
        for s in sources {
            sqlx::query(
                r#"
                INSERT INTO feed_sources
                    (name, source_type, url, is_active, fetch_interval_hours, credibility_weight, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    source_type = excluded.source_type,
                    url = excluded.url,
                    is_active = excluded.is_active,
                    fetch_interval_hours = excluded.fetch_interval_hours,
                    credibility_weight = excluded.credibility_weight,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&s.name)
            .bind(s.source_type.as_str())
            .bind(&s.url)
            .bind(s.is_active)
            .bind(s.fetch_interval_hours)
            .bind(s.credibility_weight)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<FeedSource>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, source_type, url, is_active, fetch_interval_hours, credibility_weight \
             FROM feed_sources ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_source).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = ts(DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc));
        let b = ts(DateTime::parse_from_rfc3339("2024-01-02T03:04:05.5Z").unwrap().with_timezone(&Utc));
        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_ts(&a).unwrap().timestamp(), 1_704_164_645);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("gpt_4"), "gpt\\_4");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("agents"), "agents");
    }
}
