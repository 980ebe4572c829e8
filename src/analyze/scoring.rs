//! Relevance and credibility scoring.
//!
//! Relevance is tiered keyword counting: each tier contributes `hits * weight`,
//! capped per tier, and the sum is clamped to [0,1]. Credibility starts from the
//! source-type prior and gets a flat boost for recognized official publishers.

use super::rules::{CredibilityRules, RelevanceRules, RelevanceTier};
use super::text::count_hits;
use crate::model::SourceType;

/// Per-tier contribution, already capped.
pub fn tier_contribution(lower: &str, tier: &RelevanceTier) -> f64 {
    let hits = count_hits(lower, &tier.keywords) as f64;
    (hits * tier.weight).min(tier.cap)
}

/// `lower` is the cleaned, lowercased item text.
pub fn relevance_score(lower: &str, rules: &RelevanceRules) -> f64 {
    let raw = tier_contribution(lower, &rules.high)
        + tier_contribution(lower, &rules.medium)
        + tier_contribution(lower, &rules.low);
    raw.clamp(0.0, 1.0)
}

pub fn credibility_score(source_type: SourceType, source_name: &str, rules: &CredibilityRules) -> f64 {
    let base = rules.base_for(source_type);
    let name = source_name.to_lowercase();
    let official = rules
        .official_names
        .iter()
        .any(|n| name.contains(&n.to_lowercase()));
    let score = if official {
        (base + rules.official_boost).min(1.0)
    } else {
        base
    };
    score.clamp(0.0, 1.0)
}
