// src/analyze/classify.rs
//! Content-type classification and tag generation.

use crate::analyze::rules::{ContentTypeRule, TagRules};
use crate::analyze::text::{contains_any, count_hits};
use crate::model::{ContentType, SourceType};

/// Source overrides first (arxiv, github), then keyword argmax. Ties go to the
/// earlier rule; all-zero scores fall back to `AiInsight`.
pub fn classify(lower: &str, source_type: SourceType, rules: &[ContentTypeRule]) -> ContentType {
    match source_type {
        SourceType::Arxiv => return ContentType::Research,
        SourceType::Github => return ContentType::Tooling,
        _ => {}
    }

    let mut best: Option<(ContentType, usize)> = None;
    for rule in rules {
        let hits = count_hits(lower, &rule.keywords);
        // strict `>` keeps the earliest rule on ties
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((rule.content_type, hits));
        }
    }
    best.map(|(ct, _)| ct).unwrap_or(ContentType::AiInsight)
}

/// Seed tags, then taxonomy hits, insertion order, no duplicates.
///
/// The generic tag is appended when no tag mentions "ai", then the list is
/// capped, so it drops out once the cap is already full.
pub fn generate_tags(lower: &str, seed: &[String], rules: &TagRules) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for t in seed {
        push_unique(&mut tags, t);
    }
    for rule in &rules.taxonomy {
        if contains_any(lower, &rule.keywords) {
            push_unique(&mut tags, &rule.tag);
        }
    }

    if !tags.iter().any(|t| t.to_lowercase().contains("ai")) {
        push_unique(&mut tags, &rules.generic_tag);
    }
    tags.truncate(rules.max_tags);
    tags
}

fn push_unique(tags: &mut Vec<String>, t: &str) {
    let t = t.trim();
    if !t.is_empty() && !tags.iter().any(|x| x == t) {
        tags.push(t.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::rules::RuleTable;

    #[test]
    fn arxiv_is_research_even_without_keywords() {
        let r = RuleTable::default_seed();
        let ct = classify("launch funding news.", SourceType::Arxiv, &r.content_types);
        assert_eq!(ct, ContentType::Research);
        let ct = classify("opinion piece.", SourceType::Github, &r.content_types);
        assert_eq!(ct, ContentType::Tooling);
    }

    #[test]
    fn keyword_argmax_with_declaration_order_tie_break() {
        let r = RuleTable::default_seed();
        // one Research hit ("study") and one News hit ("funding")
        let ct = classify("study on funding.", SourceType::Rss, &r.content_types);
        assert_eq!(ct, ContentType::Research);
        let ct = classify(
            "a step by step guide for beginner builders.",
            SourceType::Hackernews,
            &r.content_types,
        );
        assert_eq!(ct, ContentType::Tutorial);
        let ct = classify("nothing matches.", SourceType::Rss, &r.content_types);
        assert_eq!(ct, ContentType::AiInsight);
    }

    #[test]
    fn tags_keep_insertion_order_and_dedup() {
        let r = RuleTable::default_seed().tags;
        let seed = vec!["Research".to_string(), "AI".to_string(), "cs.AI".to_string()];
        let tags = generate_tags("an agent paper about rag.", &seed, &r);
        assert_eq!(tags, vec!["Research", "AI", "cs.AI", "AI Agents", "RAG"]);
    }

    #[test]
    fn generic_tag_is_appended_before_the_cap() {
        let r = RuleTable::default_seed().tags;
        let seed: Vec<String> = vec!["Tooling".into(), "Open Source".into()];
        let lower = "workflow llm research tutorial prompt training retrieval.";
        let tags = generate_tags(lower, &seed, &r);
        assert_eq!(
            tags,
            vec!["Tooling", "Open Source", "Automation", "LLMs", "Research", "Tutorials"]
        );

        // five tags leave room for the generic one
        let tags = generate_tags("workflow llm research.", &seed, &r);
        assert_eq!(
            tags,
            vec!["Tooling", "Open Source", "Automation", "LLMs", "Research", "AI"]
        );

        let tags = generate_tags("plain text.", &[], &r);
        assert_eq!(tags, vec!["AI"]);
    }
}
