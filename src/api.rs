use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::ingest::stable_source_id;
use crate::metrics::Metrics;
use crate::model::{
    ContentType, FeedSource, FetchRunLog, KnowledgePost, PostQuery, RawFeedItem, SourceType,
};
use crate::scheduler::{is_run_due, FeedPipeline, RunError};
use crate::store::{FeedStats, StoreError, TagCount};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FeedPipeline>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pipeline: Arc<FeedPipeline>, metrics: Metrics) -> Self {
        Self { pipeline, metrics }
    }
}

pub fn router(state: AppState) -> Router {
    let metrics = state.metrics.router();
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/posts", get(list_posts))
        .route("/posts/{id}", get(get_post))
        .route("/content-types", get(content_types))
        .route("/sources", get(sources))
        .route("/tags", get(tags))
        .route("/stats", get(stats))
        .route("/process", post(process))
        .route("/fetch", post(trigger_fetch))
        .route("/fetch-logs", get(fetch_logs))
        .merge(metrics)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => {
                tracing::error!(error = %format!("{self:#}"), "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn check_range(name: &str, v: i64, lo: i64, hi: i64) -> Result<(), ApiError> {
    if (lo..=hi).contains(&v) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "{name} must be between {lo} and {hi}, got {v}"
        )))
    }
}

#[derive(Deserialize, Default)]
struct PostsParams {
    page: Option<i64>,
    page_size: Option<i64>,
    content_type: Option<String>,
    tag: Option<String>,
    source_type: Option<String>,
    search: Option<String>,
    days: Option<i64>,
}

#[derive(Serialize)]
struct PostsPage {
    posts: Vec<KnowledgePost>,
    total: usize,
    page: i64,
    page_size: i64,
    has_more: bool,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl PostsParams {
    fn into_query(self, now: DateTime<Utc>) -> Result<(PostQuery, i64, i64), ApiError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(10);
        check_range("page", page, 1, 100_000)?;
        check_range("page_size", page_size, 1, 50)?;
        if let Some(d) = self.days {
            check_range("days", d, 1, 365)?;
        }

        let content_type = match non_blank(self.content_type) {
            Some(s) => Some(
                ContentType::parse(&s)
                    .ok_or_else(|| ApiError::Validation(format!("unknown content_type {s:?}")))?,
            ),
            None => None,
        };
        let source_type = match non_blank(self.source_type) {
            Some(s) => match SourceType::parse(&s) {
                SourceType::Unknown => {
                    return Err(ApiError::Validation(format!("unknown source_type {s:?}")))
                }
                st => Some(st),
            },
            None => None,
        };

        let q = PostQuery {
            since: self.days.map(|d| now - Duration::days(d)),
            content_type,
            tag: non_blank(self.tag),
            source_type,
            search: non_blank(self.search),
            offset: ((page - 1) * page_size) as usize,
            limit: page_size as usize,
        };
        Ok((q, page, page_size))
    }
}

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostsParams>,
) -> ApiResult<PostsPage> {
    let (q, page, page_size) = params.into_query(Utc::now())?;
    let (posts, total) = state.pipeline.store().list_posts(&q).await?;
    let has_more = (page * page_size) < total as i64;
    Ok(Json(PostsPage {
        posts,
        total,
        page,
        page_size,
        has_more,
    }))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<KnowledgePost> {
    state
        .pipeline
        .store()
        .record_view(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))
}

#[derive(Serialize)]
struct ContentTypeOut {
    value: &'static str,
    label: &'static str,
}

async fn content_types() -> Json<Vec<ContentTypeOut>> {
    Json(
        ContentType::ALL
            .iter()
            .map(|c| ContentTypeOut {
                value: c.as_str(),
                label: c.label(),
            })
            .collect(),
    )
}

async fn sources(State(state): State<AppState>) -> Json<Vec<FeedSource>> {
    Json(state.pipeline.registry().catalog())
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

async fn tags(
    State(state): State<AppState>,
    Query(p): Query<LimitParams>,
) -> ApiResult<Vec<TagCount>> {
    let limit = p.limit.unwrap_or(20);
    check_range("limit", limit, 1, 50)?;
    let since = Utc::now() - Duration::days(7);
    let v = state
        .pipeline
        .store()
        .tag_counts(since, limit as usize)
        .await?;
    Ok(Json(v))
}

async fn stats(State(state): State<AppState>) -> ApiResult<FeedStats> {
    Ok(Json(state.pipeline.store().stats(Utc::now()).await?))
}

#[derive(Deserialize)]
struct ProcessReq {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default = "manual_source_type")]
    source_type: String,
    #[serde(default)]
    source_name: Option<String>,
}

fn manual_source_type() -> String {
    "manual".to_string()
}

#[derive(Serialize)]
struct ProcessResp {
    summary: String,
    key_insights: Vec<String>,
    practical_takeaways: Vec<String>,
    why_it_matters: String,
    content_type: ContentType,
    tags: Vec<String>,
    relevance_score: f64,
    credibility_score: f64,
    rules_version: String,
}

async fn process(
    State(state): State<AppState>,
    Json(body): Json<ProcessReq>,
) -> ApiResult<ProcessResp> {
    if body.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    let url = body.source_url.unwrap_or_default();
    let raw = RawFeedItem {
        source_id: stable_source_id("manual", if url.is_empty() { &body.title } else { &url }),
        source_type: SourceType::parse(&body.source_type),
        source_name: body.source_name.unwrap_or_else(|| "Manual".to_string()),
        source_url: url,
        title: body.title,
        content: body.content,
        author: None,
        published_at: Utc::now(),
        tags: vec![],
    };
    let processor = state.pipeline.processor();
    let p = processor
        .process(raw)
        .map_err(|e| ApiError::Validation(format!("{e:#}")))?;
    Ok(Json(ProcessResp {
        summary: p.summary,
        key_insights: p.key_insights,
        practical_takeaways: p.practical_takeaways,
        why_it_matters: p.why_it_matters,
        content_type: p.content_type,
        tags: p.raw.tags,
        relevance_score: p.relevance_score,
        credibility_score: p.credibility_score,
        rules_version: processor.rules().version.clone(),
    }))
}

#[derive(Deserialize)]
struct FetchParams {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct FetchResp {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_fetch: Option<Option<DateTime<Utc>>>,
}

/// Fire-and-forget: the run executes on its own task, the caller polls `/fetch-logs`.
async fn trigger_fetch(
    State(state): State<AppState>,
    Query(p): Query<FetchParams>,
) -> ApiResult<FetchResp> {
    let pipeline = state.pipeline;
    if !p.force {
        let last = pipeline.last_successful_run().await?;
        let due = is_run_due(last.as_ref(), Utc::now(), pipeline.refetch_after());
        if !due {
            return Ok(Json(FetchResp {
                status: "skipped",
                last_fetch: Some(last.and_then(|l| l.completed_at)),
            }));
        }
    }
    if pipeline.is_running() {
        return Ok(Json(FetchResp {
            status: "running",
            last_fetch: None,
        }));
    }

    tokio::spawn(async move {
        match pipeline.run_daily_update().await {
            Ok(s) => tracing::info!(run_id = s.run_id, published = s.items_published, "triggered run done"),
            Err(RunError::AlreadyRunning) => tracing::info!("triggered run skipped; another run in progress"),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "triggered run failed"),
        }
    });
    Ok(Json(FetchResp {
        status: "started",
        last_fetch: None,
    }))
}

async fn fetch_logs(
    State(state): State<AppState>,
    Query(p): Query<LimitParams>,
) -> ApiResult<Vec<FetchRunLog>> {
    let limit = p.limit.unwrap_or(10);
    check_range("limit", limit, 1, 100)?;
    Ok(Json(
        state.pipeline.store().recent_runs(limit as usize).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posts_params_reject_out_of_range_values() {
        let now = Utc::now();
        let p = PostsParams {
            page_size: Some(51),
            ..PostsParams::default()
        };
        assert!(matches!(p.into_query(now), Err(ApiError::Validation(_))));
        let p = PostsParams {
            days: Some(0),
            ..PostsParams::default()
        };
        assert!(matches!(p.into_query(now), Err(ApiError::Validation(_))));
        let p = PostsParams {
            source_type: Some("twitter".into()),
            ..PostsParams::default()
        };
        assert!(matches!(p.into_query(now), Err(ApiError::Validation(_))));
    }

    #[test]
    fn posts_params_map_to_query() {
        let now = Utc::now();
        let p = PostsParams {
            page: Some(3),
            page_size: Some(20),
            content_type: Some("ai insight".into()),
            tag: Some("  ".into()),
            days: Some(7),
            ..PostsParams::default()
        };
        let (q, page, size) = p.into_query(now).unwrap();
        assert_eq!((page, size), (3, 20));
        assert_eq!(q.offset, 40);
        assert_eq!(q.limit, 20);
        assert_eq!(q.content_type, Some(ContentType::AiInsight));
        assert!(q.tag.is_none());
        assert_eq!(q.since, Some(now - Duration::days(7)));
    }
}
