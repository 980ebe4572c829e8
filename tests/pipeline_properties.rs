// tests/pipeline_properties.rs
//
// Dedup, scoring, classification and ranking properties, plus one end-to-end
// pass through the same stages the orchestrator chains.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use ai_knowledge_feed::analyze::rules::RuleTable;
use ai_knowledge_feed::analyze::scoring::{relevance_score, tier_contribution};
use ai_knowledge_feed::analyze::{combined_score, rank_and_select, ContentProcessor, RankParams};
use ai_knowledge_feed::config::PipelineConfig;
use ai_knowledge_feed::ingest::dedup::{dedup_batch, normalize_title};
use ai_knowledge_feed::model::{ContentType, SourceType};
use ai_knowledge_feed::store::{FeedStore, InMemoryStore};

use common::{pipeline_with, raw};

#[test]
fn dedup_second_pass_accepts_nothing() {
    let batch = vec![
        raw("a", SourceType::Rss, "Agents everywhere", "x"),
        raw("b", SourceType::Github, "acme/kit: agent toolkit", "y"),
        raw("c", SourceType::Arxiv, "On sparse attention", "z"),
    ];
    let (first, stats) = dedup_batch(batch.clone(), &HashSet::new());
    assert_eq!(first.len(), 3);
    assert_eq!(stats.dropped(), 0);

    let persisted: HashSet<String> = first.iter().map(|i| i.source_id.clone()).collect();
    let (second, stats) = dedup_batch(batch, &persisted);
    assert!(second.is_empty());
    assert_eq!(stats.existing, 3);
}

#[test]
fn punctuation_and_case_variants_share_a_title_key() {
    assert_eq!(
        normalize_title("AI Agents: A New Era!!!"),
        normalize_title("ai agents a new era")
    );
    let (kept, stats) = dedup_batch(
        vec![
            raw("x1", SourceType::Rss, "AI Agents: A New Era!!!", ""),
            raw("x2", SourceType::Hackernews, "ai agents a new era", ""),
        ],
        &HashSet::new(),
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_id, "x1");
    assert_eq!(stats.title, 1);
}

#[test]
fn relevance_stays_in_unit_interval_and_tiers_cap() {
    let rules = RuleTable::default_seed().relevance;
    let ten_high = "llm gpt claude gemini agentic langchain autogen rag embedding inference";
    assert!((tier_contribution(ten_high, &rules.high) - 0.6).abs() < 1e-9);

    let everything = format!(
        "{ten_high} artificial intelligence machine learning deep learning transformer nlp \
         algorithm model python api software"
    );
    for text in ["", "nothing to see here", ten_high, everything.as_str()] {
        let s = relevance_score(text, &rules);
        assert!((0.0..=1.0).contains(&s), "{text:?} scored {s}");
    }
    assert!((relevance_score(&everything, &rules) - 1.0).abs() < 1e-9);
}

#[test]
fn combined_score_uses_sixty_forty_blend() {
    let c = combined_score(0.8, 0.9, &RankParams::default());
    assert!((c - 0.84).abs() < 1e-9);
}

#[test]
fn arxiv_items_are_research_even_without_research_keywords() {
    let p = ContentProcessor::with_default_rules().unwrap();
    let item = raw(
        "arxiv_9999",
        SourceType::Arxiv,
        "Tips for a sourdough starter",
        "Flour, water and patience.",
    );
    let out = p.process(item).unwrap();
    assert_eq!(out.content_type, ContentType::Research);
}

#[test]
fn same_batch_duplicates_and_low_relevance_items_do_not_publish() {
    let p = ContentProcessor::with_default_rules().unwrap();
    let batch = vec![
        raw(
            "arxiv_1234",
            SourceType::Arxiv,
            "Multi-agent llm planning",
            "We study gpt and claude as planners.",
        ),
        raw(
            "arxiv_1234",
            SourceType::Arxiv,
            "Multi-agent llm planning (v2 listing)",
            "Same paper seen twice.",
        ),
        // llm (0.15) + deep learning (0.08) + python (0.02) = 0.25
        raw(
            "gh_77",
            SourceType::Github,
            "Notes on an llm",
            "Trained with deep learning in python.",
        ),
    ];

    let (fresh, stats) = dedup_batch(batch, &HashSet::new());
    assert_eq!(stats.batch_id, 1);
    assert_eq!(fresh.len(), 2);

    let processed = p.process_batch(fresh);
    assert_eq!(processed.len(), 2);
    let low = processed.iter().find(|i| i.raw.source_id == "gh_77").unwrap();
    assert!((low.relevance_score - 0.25).abs() < 1e-9);

    let selected = rank_and_select(processed, &RankParams::default());
    let ids: Vec<_> = selected.iter().map(|i| i.raw.source_id.as_str()).collect();
    assert_eq!(ids, vec!["arxiv_1234"]);
    assert!(selected[0].combined_score.is_some());
}

#[tokio::test]
async fn orchestrated_run_keeps_one_copy_and_skips_low_relevance() {
    let store = Arc::new(InMemoryStore::new());
    let items = vec![
        raw("arxiv_1234", SourceType::Arxiv, "Multi-agent llm planning", "gpt and claude planners."),
        raw("arxiv_1234", SourceType::Arxiv, "Another listing", "Duplicate id."),
        raw("gh_77", SourceType::Github, "Notes on an llm", "Trained with deep learning in python."),
    ];
    let pipeline = pipeline_with(store.clone(), items, &PipelineConfig::default());

    let s = pipeline.run_daily_update().await.unwrap();
    assert_eq!(s.items_fetched, 3);
    assert_eq!(s.items_processed, 2);
    assert_eq!(s.items_published, 1);

    let ids = store.existing_source_ids().await.unwrap();
    assert!(ids.contains("arxiv_1234"));
    assert!(!ids.contains("gh_77"));
}
