// src/analyze/summary.rs
//! Summary and key-insight extraction.

use regex::Regex;

use crate::analyze::rules::{InsightRules, SummaryRules};
use crate::analyze::text::{capitalize_first, char_len, split_sentences, truncate_at_word};

/// Greedy sentence packing under a character budget.
///
/// Short texts come back unchanged. Longer ones keep whole sentences (at most
/// `max_sentences`) while the running length stays within `max_chars`; an ellipsis
/// marks anything cut. A first sentence already over budget is cut at a word boundary.
pub fn summarize(text: &str, rules: &SummaryRules) -> String {
    let total = char_len(text);
    if total < rules.short_text_chars {
        return text.to_string();
    }

    let sentences = split_sentences(text);
    let mut picked: Vec<&str> = Vec::new();
    let mut used = 0usize;
    for s in sentences.iter().take(rules.max_sentences) {
        let n = char_len(s);
        if used + n > rules.max_chars {
            break;
        }
        picked.push(s);
        used += n;
    }

    let summary = if picked.is_empty() {
        truncate_at_word(text, rules.max_chars)
    } else {
        picked.join(" ")
    };

    if char_len(&summary) < total {
        format!("{}...", summary.trim_end_matches('.'))
    } else {
        summary
    }
}

/// Pattern matches first (lowercased text, capture group 1), then a sentence fallback.
pub fn extract_insights(text: &str, patterns: &[Regex], rules: &InsightRules) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut insights: Vec<String> = Vec::new();

    for re in patterns {
        for caps in re.captures_iter(&lower).take(rules.matches_per_pattern) {
            let Some(m) = caps.get(1) else { continue };
            let insight = capitalize_first(m.as_str().trim());
            if char_len(&insight) > rules.min_match_chars && !insights.contains(&insight) {
                insights.push(insight);
            }
        }
    }

    if insights.is_empty() {
        for s in split_sentences(text)
            .into_iter()
            .take(rules.fallback_sentences)
        {
            let n = char_len(&s);
            if n > rules.fallback_min_chars && n < rules.fallback_max_chars {
                insights.push(s);
            }
        }
    }

    insights.truncate(rules.max_insights);
    insights
}
