use crate::domain_utils::DomainUtils;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fetched message as seen by the filters. Filters only read it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMessage", into = "RawMessage")]
pub struct Email {
    pub message_id: String,
    pub thread_id: String,
    /// Raw From header, e.g. `"Jane <jane@lever.co>"`
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub body_text: String,
    pub labels: Vec<String>,
}

impl Email {
    pub fn new(from: &str, subject: &str, body_text: &str) -> Self {
        Self {
            from: from.to_string(),
            subject: subject.to_string(),
            body_text: body_text.to_string(),
            ..Default::default()
        }
    }

    pub fn sender_address(&self) -> Option<String> {
        DomainUtils::extract_address(&self.from)
    }

    pub fn sender_domain(&self) -> Option<String> {
        self.sender_address()
            .and_then(|addr| DomainUtils::extract_domain(&addr))
    }

    pub fn sender_local_part(&self) -> Option<String> {
        self.sender_address()
            .and_then(|addr| DomainUtils::extract_local_part(&addr))
    }

    /// Subject, snippet and body joined by newlines, trimmed and lower-cased
    pub fn combined_text(&self) -> String {
        format!("{}\n{}\n{}", self.subject, self.snippet, self.body_text)
            .trim()
            .to_lowercase()
    }
}

// On-disk layout written by the mail fetcher. Every field may be missing.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawMessage {
    message_id: String,
    thread_id: String,
    headers: RawHeaders,
    snippet: String,
    body: RawBody,
    labels: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawHeaders {
    from: String,
    subject: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawBody {
    text: String,
}

impl From<RawMessage> for Email {
    fn from(raw: RawMessage) -> Self {
        Self {
            message_id: raw.message_id,
            thread_id: raw.thread_id,
            from: raw.headers.from,
            subject: raw.headers.subject,
            snippet: raw.snippet,
            body_text: raw.body.text,
            labels: raw.labels,
        }
    }
}

impl From<Email> for RawMessage {
    fn from(email: Email) -> Self {
        Self {
            message_id: email.message_id,
            thread_id: email.thread_id,
            headers: RawHeaders {
                from: email.from,
                subject: email.subject,
            },
            snippet: email.snippet,
            body: RawBody {
                text: email.body_text,
            },
            labels: email.labels,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageFile {
    // Tried first: a derived struct would also accept a sequence
    Bare(Vec<Email>),
    Envelope { messages: Vec<Email> },
}

/// Load a batch of messages.
///
/// `.jsonl` files hold one message per line. Anything else is parsed as JSON,
/// either a `{"messages": [...]}` envelope or a bare array.
pub fn load_messages<P: AsRef<Path>>(path: P) -> Result<Vec<Email>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages from {}", path.display()))?;

    let is_jsonl = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);

    if is_jsonl {
        return content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str::<Email>(line).with_context(|| {
                    format!("Invalid message on line {} of {}", idx + 1, path.display())
                })
            })
            .collect();
    }

    let file: MessageFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid messages file {}", path.display()))?;
    Ok(match file {
        MessageFile::Bare(messages) => messages,
        MessageFile::Envelope { messages } => messages,
    })
}
