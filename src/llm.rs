//! Remote-model relevance filter.
//!
//! [`LlmFilter`] asks a [`RelevanceModel`] whether an email is a real job
//! opportunity. The model is a seam: [`OpenAiModel`] talks to an
//! OpenAI-compatible chat-completions endpoint, tests plug in a stub.

use crate::decision::FilterDecision;
use crate::email::Email;
use crate::filter::EmailFilter;
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const FILTER_NAME: &str = "llm";

pub const DEFAULT_MAX_BODY_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "Decide if this email is a job opportunity. \
    Return JSON with keys: keep (boolean) and reason (string). \
    Keep only real job opportunities or recruiter outreach.";

/// What the model gets to see
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceRequest {
    pub subject: String,
    pub from: String,
    pub snippet: String,
    pub body: String,
}

impl RelevanceRequest {
    pub fn from_email(email: &Email, max_body_chars: usize) -> Self {
        Self {
            subject: email.subject.clone(),
            from: email.from.clone(),
            snippet: email.snippet.clone(),
            body: email.body_text.chars().take(max_body_chars).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelevanceVerdict {
    #[serde(default)]
    pub keep: bool,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "llm decision".to_string()
}

impl RelevanceVerdict {
    /// Parse the model's JSON answer. Anything unparseable rejects.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text.trim()).unwrap_or_else(|e| {
            log::debug!("Unparseable model response ({}): {}", e, text);
            Self {
                keep: false,
                reason: "invalid LLM response".to_string(),
            }
        })
    }
}

pub trait RelevanceModel: Send + Sync {
    fn classify(&self, request: &RelevanceRequest) -> Result<RelevanceVerdict>;
}

pub struct LlmFilter {
    model: Box<dyn RelevanceModel>,
    max_body_chars: usize,
}

impl LlmFilter {
    pub fn new(model: Box<dyn RelevanceModel>) -> Self {
        Self {
            model,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn with_max_body_chars(mut self, max_body_chars: usize) -> Self {
        self.max_body_chars = max_body_chars;
        self
    }
}

impl EmailFilter for LlmFilter {
    fn name(&self) -> &str {
        FILTER_NAME
    }

    fn evaluate(&self, email: &Email) -> FilterDecision {
        let request = RelevanceRequest::from_email(email, self.max_body_chars);
        match self.model.classify(&request) {
            Ok(verdict) => {
                log::debug!(
                    "llm filter {} '{}': {}",
                    if verdict.keep { "passed" } else { "rejected" },
                    email.subject,
                    verdict.reason
                );
                FilterDecision::new(FILTER_NAME, verdict.keep, vec![verdict.reason])
            }
            Err(e) => {
                log::warn!("Relevance model failed for '{}': {:#}", email.subject, e);
                FilterDecision::fail(FILTER_NAME, vec![format!("llm error: {:#}", e)])
            }
        }
    }
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiModel {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiModel {
    pub fn new(endpoint: Url, model: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("opportunity-filter/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            api_key,
        })
    }

    fn request_body(&self, request: &RelevanceRequest) -> Result<serde_json::Value> {
        let user = serde_json::to_string(request)?;
        Ok(serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        }))
    }
}

impl RelevanceModel for OpenAiModel {
    fn classify(&self, request: &RelevanceRequest) -> Result<RelevanceVerdict> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request)?)
            .send()
            .with_context(|| format!("Request to {} failed", self.endpoint))?
            .error_for_status()?;

        let chat: ChatResponse = response.json().context("Malformed completion response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Completion response has no content"))?;

        Ok(RelevanceVerdict::parse(&content))
    }
}
