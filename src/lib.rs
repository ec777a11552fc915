pub mod analytics;
pub mod config;
pub mod decision;
pub mod domain_utils;
pub mod email;
pub mod filter;
pub mod keyword;
pub mod llm;
pub mod pipeline;
pub mod rules;

pub use analytics::FilterAnalytics;
pub use config::Config;
pub use decision::{FilterDecision, FilterOutcome};
pub use email::Email;
pub use filter::EmailFilter;
pub use keyword::{KeywordFilter, ScoreWeights};
pub use llm::{LlmFilter, RelevanceModel};
pub use pipeline::FilterPipeline;
pub use rules::RuleSet;
