// src/analyze/rules.rs
//! Versioned rule table for the content processor.
//!
//! Every keyword list, weight, cap and canned phrase the processor uses lives here.
//! - Built-in table: `RuleTable::default_seed()`.
//! - Replacement table: `RuleTable::from_toml_str()` / `load_from_file()` (whole-table swap,
//!   no merging).
//!
//! Bump `RULES_VERSION` whenever the built-in seed changes scoring output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::model::{ContentType, SourceType};

pub const RULES_VERSION: &str = "2024.10-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: String,
    pub summary: SummaryRules,
    pub insights: InsightRules,
    pub takeaways: TakeawayRules,
    pub importance: ImportanceRules,
    pub content_types: Vec<ContentTypeRule>,
    pub tags: TagRules,
    pub relevance: RelevanceRules,
    pub credibility: CredibilityRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRules {
    /// Cleaned texts shorter than this are returned unchanged.
    pub short_text_chars: usize,
    pub max_chars: usize,
    pub max_sentences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRules {
    /// Regexes run against the lowercased text; capture group 1 is the insight.
    pub patterns: Vec<String>,
    pub matches_per_pattern: usize,
    pub max_insights: usize,
    /// Pattern matches must be strictly longer than this (chars).
    pub min_match_chars: usize,
    /// Fallback sentences must be strictly inside (min, max) chars.
    pub fallback_min_chars: usize,
    pub fallback_max_chars: usize,
    pub fallback_sentences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTakeaway {
    pub any: Vec<String>,
    pub takeaway: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTakeaway {
    pub source_type: SourceType,
    pub takeaway: String,
    #[serde(default)]
    pub follow_up: Option<KeywordTakeaway>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeawayRules {
    pub by_source: Vec<SourceTakeaway>,
    pub by_keyword: Vec<KeywordTakeaway>,
    pub fallback: String,
    pub max_takeaways: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceTrigger {
    #[serde(default)]
    pub any: Vec<String>,
    /// Fires for this source type regardless of keywords.
    #[serde(default)]
    pub source_type: Option<SourceType>,
    pub phrase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRules {
    pub triggers: Vec<ImportanceTrigger>,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeRule {
    pub content_type: ContentType,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRules {
    pub taxonomy: Vec<TagRule>,
    /// Forced when no tag contains "ai" (case-insensitive).
    pub generic_tag: String,
    pub max_tags: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceTier {
    pub keywords: Vec<String>,
    pub weight: f64,
    pub cap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceRules {
    pub high: RelevanceTier,
    pub medium: RelevanceTier,
    pub low: RelevanceTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibilityBase {
    pub source_type: SourceType,
    pub base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibilityRules {
    pub bases: Vec<CredibilityBase>,
    pub unknown_base: f64,
    pub official_names: Vec<String>,
    pub official_boost: f64,
}

impl CredibilityRules {
    pub fn base_for(&self, st: SourceType) -> f64 {
        self.bases
            .iter()
            .find(|b| b.source_type == st)
            .map(|b| b.base)
            .unwrap_or(self.unknown_base)
    }
}

/// Fixed per-source-type prior used by connectors to declare their weight.
pub fn default_base_credibility(st: SourceType) -> f64 {
    match st {
        SourceType::Arxiv => 0.9,
        SourceType::Github => 0.7,
        SourceType::Rss => 0.6,
        SourceType::Hackernews => 0.6,
        SourceType::Unknown => 0.5,
    }
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

impl RuleTable {
    /// Load from a TOML string. Validates nothing beyond shape; regexes are
    /// compiled (and rejected) by the processor.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let t: RuleTable = toml::from_str(s).context("parsing rule table toml")?;
        Ok(t)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading rule table from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Built-in rule table.
    pub fn default_seed() -> Self {
        let credibility_bases = [
            SourceType::Arxiv,
            SourceType::Github,
            SourceType::Rss,
            SourceType::Hackernews,
        ]
        .into_iter()
        .map(|st| CredibilityBase {
            source_type: st,
            base: default_base_credibility(st),
        })
        .collect();

        Self {
            version: RULES_VERSION.to_string(),
            summary: SummaryRules {
                short_text_chars: 100,
                max_chars: 300,
                max_sentences: 5,
            },
            insights: InsightRules {
                patterns: strings(&[
                    r"(?:key|main|important|significant)\s+(?:finding|insight|result|takeaway)[s]?[:\s]+([^.]+\.)",
                    r"(?:we found|research shows|study reveals|results indicate)[:\s]+([^.]+\.)",
                    r"(?:notably|importantly|significantly)[,\s]+([^.]+\.)",
                ]),
                matches_per_pattern: 2,
                max_insights: 3,
                min_match_chars: 20,
                fallback_min_chars: 30,
                fallback_max_chars: 200,
                fallback_sentences: 3,
            },
            takeaways: TakeawayRules {
                by_source: vec![
                    SourceTakeaway {
                        source_type: SourceType::Github,
                        takeaway: "Explore the repository for implementation details and examples"
                            .into(),
                        follow_up: Some(KeywordTakeaway {
                            any: strings(&["install", "pip"]),
                            takeaway: "Can be installed and tested locally".into(),
                        }),
                    },
                    SourceTakeaway {
                        source_type: SourceType::Arxiv,
                        takeaway: "Review the full paper for methodology and detailed results"
                            .into(),
                        follow_up: Some(KeywordTakeaway {
                            any: strings(&["code", "github"]),
                            takeaway: "Implementation code may be available".into(),
                        }),
                    },
                    SourceTakeaway {
                        source_type: SourceType::Hackernews,
                        takeaway: "Check the discussion thread for community insights".into(),
                        follow_up: None,
                    },
                ],
                by_keyword: vec![
                    KeywordTakeaway {
                        any: strings(&["api"]),
                        takeaway: "API integration possibilities for your projects".into(),
                    },
                    KeywordTakeaway {
                        any: strings(&["tutorial", "guide", "how to"]),
                        takeaway: "Follow along to build hands-on experience".into(),
                    },
                    KeywordTakeaway {
                        any: strings(&["benchmark", "comparison", "vs"]),
                        takeaway: "Use benchmarks to inform technology choices".into(),
                    },
                    KeywordTakeaway {
                        any: strings(&["production", "deploy", "scale"]),
                        takeaway: "Consider for production deployment scenarios".into(),
                    },
                ],
                fallback: "Stay informed about developments in this area".into(),
                max_takeaways: 4,
            },
            importance: ImportanceRules {
                triggers: vec![
                    ImportanceTrigger {
                        any: strings(&["breakthrough", "novel", "first", "new approach"]),
                        source_type: None,
                        phrase: "introduces new approaches or methodologies".into(),
                    },
                    ImportanceTrigger {
                        any: strings(&["production", "real-world", "deployed", "scale"]),
                        source_type: None,
                        phrase: "demonstrates practical, real-world applications".into(),
                    },
                    ImportanceTrigger {
                        any: strings(&["open source", "github", "available"]),
                        source_type: None,
                        phrase: "provides accessible tools for practitioners".into(),
                    },
                    ImportanceTrigger {
                        any: vec![],
                        source_type: Some(SourceType::Arxiv),
                        phrase: "contributes to the research foundation of AI".into(),
                    },
                    ImportanceTrigger {
                        any: strings(&["agent", "autonomous", "multi-agent"]),
                        source_type: None,
                        phrase: "advances the field of AI agents and automation".into(),
                    },
                    ImportanceTrigger {
                        any: strings(&["efficiency", "faster", "improve", "better"]),
                        source_type: None,
                        phrase: "offers potential performance improvements".into(),
                    },
                ],
                fallback: "This content provides valuable insights into current AI developments and practices."
                    .into(),
            },
            content_types: vec![
                ContentTypeRule {
                    content_type: ContentType::Research,
                    keywords: strings(&[
                        "paper", "study", "research", "experiment", "findings", "arxiv",
                        "peer-reviewed", "methodology", "results",
                    ]),
                },
                ContentTypeRule {
                    content_type: ContentType::Tooling,
                    keywords: strings(&[
                        "library", "framework", "tool", "sdk", "api", "github", "release",
                        "version", "install", "package", "repository",
                    ]),
                },
                ContentTypeRule {
                    content_type: ContentType::Tutorial,
                    keywords: strings(&[
                        "how to", "guide", "tutorial", "step by step", "learn", "beginner",
                        "example", "walkthrough", "building",
                    ]),
                },
                ContentTypeRule {
                    content_type: ContentType::News,
                    keywords: strings(&[
                        "announced", "launch", "release", "update", "news", "company",
                        "funding", "acquisition", "partnership",
                    ]),
                },
                ContentTypeRule {
                    content_type: ContentType::AiInsight,
                    keywords: strings(&[
                        "insight", "analysis", "opinion", "perspective", "thought", "trend",
                        "future", "prediction", "implications",
                    ]),
                },
            ],
            tags: TagRules {
                taxonomy: vec![
                    TagRule {
                        tag: "AI Agents".into(),
                        keywords: strings(&["agent", "agents", "agentic", "autonomous"]),
                    },
                    TagRule {
                        tag: "Automation".into(),
                        keywords: strings(&["automation", "automate", "workflow", "pipeline"]),
                    },
                    TagRule {
                        tag: "LLMs".into(),
                        keywords: strings(&[
                            "llm", "language model", "gpt", "claude", "gemini", "mistral",
                        ]),
                    },
                    TagRule {
                        tag: "Research".into(),
                        keywords: strings(&["research", "paper", "study", "arxiv"]),
                    },
                    TagRule {
                        tag: "Open Source".into(),
                        keywords: strings(&["github", "open source", "repository", "library"]),
                    },
                    TagRule {
                        tag: "Tutorials".into(),
                        keywords: strings(&["tutorial", "guide", "how to", "learn"]),
                    },
                    TagRule {
                        tag: "Multi-Agent".into(),
                        keywords: strings(&["multi-agent", "multi agent", "swarm", "collective"]),
                    },
                    TagRule {
                        tag: "RAG".into(),
                        keywords: strings(&["rag", "retrieval", "vector", "embedding"]),
                    },
                    TagRule {
                        tag: "Prompt Engineering".into(),
                        keywords: strings(&["prompt", "prompting", "instruction"]),
                    },
                    TagRule {
                        tag: "Fine-tuning".into(),
                        keywords: strings(&["fine-tune", "fine-tuning", "training", "finetune"]),
                    },
                ],
                generic_tag: "AI".into(),
                max_tags: 6,
            },
            relevance: RelevanceRules {
                high: RelevanceTier {
                    keywords: strings(&[
                        "ai agent", "ai agents", "autonomous agent", "multi-agent", "llm",
                        "large language model", "gpt", "claude", "gemini", "automation",
                        "workflow automation", "agentic", "langchain", "autogen", "crew ai",
                        "agent framework", "tool use", "function calling", "rag",
                        "retrieval augmented", "embedding", "prompt engineering",
                        "fine-tuning", "inference",
                    ]),
                    weight: 0.15,
                    cap: 0.6,
                },
                medium: RelevanceTier {
                    keywords: strings(&[
                        "artificial intelligence", "machine learning", "neural network",
                        "deep learning", "transformer", "natural language processing", "nlp",
                        "computer vision", "reinforcement learning", "generative ai",
                        "chatbot", "conversational ai",
                    ]),
                    weight: 0.08,
                    cap: 0.3,
                },
                low: RelevanceTier {
                    keywords: strings(&[
                        "algorithm", "model", "data science", "python", "api", "engineering",
                        "software", "development", "open source",
                    ]),
                    weight: 0.02,
                    cap: 0.1,
                },
            },
            credibility: CredibilityRules {
                bases: credibility_bases,
                unknown_base: default_base_credibility(SourceType::Unknown),
                official_names: strings(&["openai", "anthropic", "google", "meta"]),
                official_boost: 0.2,
            },
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::default_seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trips_through_toml() {
        let seed = RuleTable::default_seed();
        let text = toml::to_string(&seed).expect("serialize seed");
        let back = RuleTable::from_toml_str(&text).expect("parse seed");
        assert_eq!(back, seed);
        assert_eq!(back.version, RULES_VERSION);
    }

    #[test]
    fn credibility_bases_follow_source_priors() {
        let t = RuleTable::default_seed();
        assert!((t.credibility.base_for(SourceType::Arxiv) - 0.9).abs() < 1e-9);
        assert!((t.credibility.base_for(SourceType::Github) - 0.7).abs() < 1e-9);
        assert!((t.credibility.base_for(SourceType::Unknown) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn content_type_rules_keep_taxonomy_order() {
        let t = RuleTable::default_seed();
        let order: Vec<_> = t.content_types.iter().map(|r| r.content_type).collect();
        assert_eq!(order, ContentType::ALL.to_vec());
    }

    #[test]
    fn missing_sections_are_rejected() {
        let err = RuleTable::from_toml_str("version = \"x\"").unwrap_err();
        assert!(format!("{err:#}").contains("rule table"));
    }
}
