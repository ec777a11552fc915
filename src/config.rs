use crate::filter::EmailFilter;
use crate::keyword::{KeywordFilter, ScoreWeights};
use crate::llm::{LlmFilter, OpenAiModel, DEFAULT_MAX_BODY_CHARS};
use crate::pipeline::FilterPipeline;
use crate::rules::RuleSet;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule override file; the built-in rule set is used when absent
    pub rules_file: Option<String>,
    pub stop_on_reject: bool,
    pub weights: ScoreWeights,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: String,
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub max_body_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rules_file: None,
            stop_on_reject: true,
            weights: ScoreWeights::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            enabled: false,
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 30,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.weights.pass_threshold.is_finite() {
            bail!("weights.pass_threshold must be a finite number");
        }
        if self.llm.enabled {
            self.llm.endpoint_url()?;
        }
        Ok(())
    }

    pub fn load_rules(&self) -> anyhow::Result<RuleSet> {
        match &self.rules_file {
            Some(path) => {
                let rules = RuleSet::from_file(path)?;
                log::info!("Loaded filter rules from {}", path);
                Ok(rules)
            }
            None => Ok(RuleSet::default()),
        }
    }

    /// Keyword filter first, then the remote model when enabled
    pub fn build_pipeline(&self, rules: &RuleSet) -> anyhow::Result<FilterPipeline> {
        let mut filters: Vec<Box<dyn EmailFilter>> = vec![Box::new(KeywordFilter::with_weights(
            rules,
            self.weights.clone(),
        )?)];

        if self.llm.enabled {
            filters.push(Box::new(self.llm.build_filter()?));
        }

        let pipeline = FilterPipeline::new(filters).with_stop_on_reject(self.stop_on_reject);
        log::info!(
            "Filter pipeline: [{}] (stop on reject: {})",
            pipeline.filter_names().join(", "),
            self.stop_on_reject
        );
        Ok(pipeline)
    }
}

impl LlmConfig {
    pub fn endpoint_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid llm.endpoint: {}", self.endpoint))
    }

    pub fn build_filter(&self) -> anyhow::Result<LlmFilter> {
        let api_key = std::env::var(&self.api_key_env)
            .with_context(|| format!("LLM filter enabled but {} is not set", self.api_key_env))?;
        let model = OpenAiModel::new(
            self.endpoint_url()?,
            &self.model,
            api_key,
            Duration::from_secs(self.timeout_seconds),
        )?;
        Ok(LlmFilter::new(Box::new(model)).with_max_body_chars(self.max_body_chars))
    }
}
