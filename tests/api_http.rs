// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// The router is exercised directly via tower::ServiceExt::oneshot.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as Json};
use http::{Request, StatusCode};
use shuttle_axum::axum::{
    body::{self, Body},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use ai_knowledge_feed::config::PipelineConfig;
use ai_knowledge_feed::metrics::Metrics;
use ai_knowledge_feed::model::{PostQuery, RawFeedItem};
use ai_knowledge_feed::scheduler::FeedPipeline;
use ai_knowledge_feed::store::{FeedStore, InMemoryStore};
use ai_knowledge_feed::{router, AppState};

use common::{five_relevant_items, pipeline_with};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn test_app(items: Vec<RawFeedItem>) -> (Router, Arc<FeedPipeline>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Arc::new(pipeline_with(store.clone(), items, &PipelineConfig::default()));
    let metrics = Metrics::init().expect("metrics recorder");
    let app = router(AppState::new(pipeline.clone(), metrics));
    (app, pipeline, store)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let (status, bytes) = send(app, req).await;
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

async fn post_json(app: &Router, uri: &str, payload: Option<Json>) -> (StatusCode, Json) {
    let req = Request::post(uri)
        .header("content-type", "application/json")
        .body(match payload {
            Some(p) => Body::from(p.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let (status, bytes) = send(app, req).await;
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

/// Polls until `runs` log rows exist and all of them are finished.
async fn wait_for_runs(pipeline: &FeedPipeline, runs: usize) {
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if pipeline.is_running() {
            continue;
        }
        let logs = pipeline.store().recent_runs(runs + 1).await.unwrap();
        if logs.len() == runs && logs.iter().all(|l| l.completed_at.is_some()) {
            return;
        }
    }
    panic!("triggered run did not finish in time");
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _, _) = test_app(vec![]);
    let (status, bytes) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
async fn fetch_starts_then_skips_until_forced() {
    let (app, pipeline, _) = test_app(five_relevant_items());

    let (status, v) = post_json(&app, "/fetch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "started");
    wait_for_runs(&pipeline, 1).await;

    let (_, v) = post_json(&app, "/fetch", None).await;
    assert_eq!(v["status"], "skipped");
    assert!(v["last_fetch"].is_string(), "last_fetch should be a timestamp: {v}");

    let (_, v) = post_json(&app, "/fetch?force=true", None).await;
    assert_eq!(v["status"], "started");
    wait_for_runs(&pipeline, 2).await;

    let (status, logs) = get_json(&app, "/fetch-logs?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["status"], "success");
    assert_eq!(logs[0]["items_published"], 0, "second run finds only duplicates");
    assert_eq!(logs[1]["items_published"], 5);
}

#[tokio::test]
async fn posts_listing_paginates_and_filters() {
    let (app, pipeline, _) = test_app(five_relevant_items());
    pipeline.run_daily_update().await.unwrap();

    let (status, v) = get_json(&app, "/posts?page=1&page_size=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 5);
    assert_eq!(v["posts"].as_array().unwrap().len(), 2);
    assert_eq!(v["has_more"], true);

    let (_, v) = get_json(&app, "/posts?page=3&page_size=2").await;
    assert_eq!(v["posts"].as_array().unwrap().len(), 1);
    assert_eq!(v["has_more"], false);

    let (_, v) = get_json(&app, "/posts?search=FIELD%20REPORT%203").await;
    assert_eq!(v["total"], 1);

    let (_, v) = get_json(&app, "/posts?source_type=arxiv").await;
    assert_eq!(v["total"], 0);

    let (_, v) = get_json(&app, "/posts?days=7&tag=LLMs").await;
    assert_eq!(v["total"], 5);
}

#[tokio::test]
async fn out_of_range_query_params_are_422() {
    let (app, _, _) = test_app(vec![]);
    for uri in [
        "/posts?page_size=0",
        "/posts?page_size=51",
        "/posts?days=400",
        "/posts?content_type=Podcast",
        "/tags?limit=0",
        "/fetch-logs?limit=101",
    ] {
        let (status, v) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(v["error"].is_string(), "{uri}: {v}");
    }
}

#[tokio::test]
async fn single_post_counts_views_and_404s() {
    let (app, pipeline, store) = test_app(five_relevant_items());
    pipeline.run_daily_update().await.unwrap();
    let (posts, _) = store
        .list_posts(&PostQuery {
            limit: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    let id = posts[0].id;

    get_json(&app, &format!("/posts/{id}")).await;
    let (status, v) = get_json(&app, &format!("/posts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["view_count"], 2);

    let (status, v) = get_json(&app, "/posts/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["error"].as_str().unwrap().contains("9999"));
}

#[tokio::test]
async fn catalogs_tags_and_stats() {
    let (app, pipeline, _) = test_app(five_relevant_items());
    pipeline.sync_sources().await.unwrap();
    pipeline.run_daily_update().await.unwrap();

    let (_, v) = get_json(&app, "/content-types").await;
    let values: Vec<_> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["value"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(values, ["Research", "Tooling", "Tutorial", "News", "AI Insight"]);

    let (_, v) = get_json(&app, "/sources").await;
    assert_eq!(v[0]["name"], "Stub");

    let (status, v) = get_json(&app, "/tags?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    let tags = v.as_array().unwrap();
    assert!(!tags.is_empty() && tags.len() <= 3);
    assert_eq!(tags[0]["count"], 5);

    let (_, v) = get_json(&app, "/stats").await;
    assert_eq!(v["total_posts"], 5);
    assert_eq!(v["week_posts"], 5);
    assert_eq!(v["active_sources"], 1);
    assert!(v["last_fetch"].is_string());
}

#[tokio::test]
async fn process_endpoint_scores_without_persisting() {
    let (app, _, store) = test_app(vec![]);

    let payload = json!({
        "title": "Fine-tuning an llm with rag for customer support",
        "content": "A step by step guide to building an AI agent with langchain.",
        "source_type": "manual"
    });
    let (status, v) = post_json(&app, "/process", Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "{v}");
    let rel = v["relevance_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&rel));
    assert!((v["credibility_score"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert!(v["tags"].as_array().unwrap().iter().any(|t| t == "LLMs"));
    assert!(v["rules_version"].is_string());
    assert!(store.existing_source_ids().await.unwrap().is_empty());

    let (status, _) = post_json(&app, "/process", Some(json!({ "title": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(&app, "/process", Some(json!({ "content": "no title" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let arxiv = json!({ "title": "Sourdough notes", "content": "Flour.", "source_type": "arxiv" });
    let (_, v) = post_json(&app, "/process", Some(arxiv)).await;
    assert_eq!(v["content_type"], "Research");
}

#[tokio::test]
async fn metrics_endpoint_exposes_run_series() {
    let (app, pipeline, _) = test_app(five_relevant_items());
    pipeline.run_daily_update().await.unwrap();

    let (status, bytes) = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    for needle in ["feed_runs_total", "feed_run_duration_ms", "feed_items_processed_total"] {
        assert!(text.contains(needle), "metrics exposition missing '{needle}'\n{text}");
    }
}
