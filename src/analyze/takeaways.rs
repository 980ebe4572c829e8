// src/analyze/takeaways.rs
//! Reader-facing guidance: practical takeaways and the "why it matters" line.

use crate::analyze::rules::{ImportanceRules, TakeawayRules};
use crate::analyze::text::contains_any;
use crate::model::SourceType;

/// `lower` must be the cleaned, lowercased item text.
pub fn practical_takeaways(lower: &str, source_type: SourceType, rules: &TakeawayRules) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    if let Some(rule) = rules.by_source.iter().find(|r| r.source_type == source_type) {
        out.push(rule.takeaway.clone());
        if let Some(follow) = &rule.follow_up {
            if contains_any(lower, &follow.any) {
                out.push(follow.takeaway.clone());
            }
        }
    }

    for rule in &rules.by_keyword {
        if contains_any(lower, &rule.any) {
            out.push(rule.takeaway.clone());
        }
    }

    if out.is_empty() {
        out.push(rules.fallback.clone());
    }
    out.truncate(rules.max_takeaways);
    out
}

/// First one or two triggered factors joined into one sentence.
pub fn why_it_matters(lower: &str, source_type: SourceType, rules: &ImportanceRules) -> String {
    let factors: Vec<&str> = rules
        .triggers
        .iter()
        .filter(|t| {
            t.source_type == Some(source_type) || (!t.any.is_empty() && contains_any(lower, &t.any))
        })
        .map(|t| t.phrase.as_str())
        .take(2)
        .collect();

    match factors.as_slice() {
        [] => rules.fallback.clone(),
        [one] => format!("This {one}."),
        [first, second, ..] => format!("This {first} and {second}."),
    }
}
