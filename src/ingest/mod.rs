// src/ingest/mod.rs
pub mod dedup;
pub mod http;
pub mod providers;
pub mod registry;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sha2::{Digest, Sha256};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_items_fetched_total",
            "Raw items returned by connectors."
        );
        describe_counter!(
            "feed_connector_errors_total",
            "Connector sub-query fetch/parse errors."
        );
        describe_counter!(
            "feed_dedup_dropped_total",
            "Items removed by deduplication (by reason)."
        );
        describe_counter!(
            "feed_items_processed_total",
            "Items that made it through the content processor."
        );
        describe_counter!(
            "feed_process_errors_total",
            "Items dropped because processing failed."
        );
        describe_counter!("feed_items_published_total", "Posts persisted by runs.");
        describe_counter!(
            "feed_persist_errors_total",
            "Selected items that failed to persist."
        );
        describe_counter!("feed_runs_total", "Orchestrator runs (by status).");
        describe_histogram!("feed_run_duration_ms", "Run wall time in milliseconds.");
        describe_histogram!("feed_parse_ms", "Connector payload parse time in milliseconds.");
        describe_gauge!("feed_last_run_ts", "Unix ts when the last run finished.");
    });
}

/// Log + count a sub-query failure. The connector keeps going.
pub(crate) fn record_connector_error(source: &'static str, what: &str, err: &anyhow::Error) {
    tracing::warn!(target: "ingest", source, what, error = %format!("{err:#}"), "connector sub-query failed");
    counter!("feed_connector_errors_total", "source" => source).increment(1);
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:!?])").expect("punctuation regex"));

/// Strip HTML tags, decode entities, collapse whitespace.
///
/// Tags become spaces, so `<b>agents</b>.` would leave a gap before the dot;
/// whitespace in front of punctuation is dropped.
pub fn strip_markup(s: &str) -> String {
    let no_tags = RE_TAGS.replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    let collapsed = RE_WS.replace_all(&decoded, " ");
    RE_SPACE_BEFORE_PUNCT
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}

/// Char-safe length cap.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Collapse internal newlines/runs of whitespace (arXiv titles wrap).
pub fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s.trim(), " ").to_string()
}

/// `"{prefix}_{first 16 hex of sha256(link)}"`; identical across processes and builds.
pub fn stable_source_id(prefix: &str, link: &str) -> String {
    let digest = Sha256::digest(link.trim().as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{prefix}_{hex}")
}

/// Some publishers ship HTML entities that XML does not define.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
