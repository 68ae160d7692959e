//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure-style gateways, Ollama, vLLM, and any other
//! endpoint that follows the chat completions contract. Non-streaming:
//! one request, one response.

use std::time::{Duration, Instant};

use serde_json::Value;

use cc_domain::config::{HistoryConfig, ProviderConfig};
use cc_domain::error::{Error, Result};
use cc_domain::message::{Message, Role};
use cc_domain::trace::TraceEvent;

use crate::traits::{PrimingContext, ProviderClient};

/// Priming used when a provider has no templates configured.
const DEFAULT_PRIMING: &str = "You are the assistant for \"{conversation}\". \
     Answer {user}'s questions about the course. When context documents are \
     supplied, ground your answer in them and cite their titles.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    priming_templates: Vec<String>,
    max_history_messages: usize,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new adapter from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig, history: &HistoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            id: cfg.id.clone(),
            name: cfg.name.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            priming_templates: cfg.priming.clone(),
            max_history_messages: history.max_messages,
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut rb = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            rb = rb.header("Authorization", format!("Bearer {key}"));
        }
        rb
    }

    fn build_chat_body(&self, history: &[Message]) -> Value {
        let messages: Vec<Value> = history.iter().map(msg_to_wire).collect();
        serde_json::json!({
            "model": self.model,
            "messages": messages,
        })
    }

    fn provider_err(&self, message: impl Into<String>) -> Error {
        Error::ProviderUnavailable {
            provider: self.id.clone(),
            message: message.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ProviderClient for OpenAiCompatProvider {
    async fn generate_priming(&self, ctx: &PrimingContext) -> Result<Vec<Message>> {
        let templates: Vec<&str> = if self.priming_templates.is_empty() {
            vec![DEFAULT_PRIMING]
        } else {
            self.priming_templates.iter().map(String::as_str).collect()
        };

        let priming = templates
            .iter()
            .map(|t| Message::system(render_template(t, ctx)))
            .collect();
        Ok(priming)
    }

    async fn chat(&self, history: &[Message]) -> Result<Vec<Message>> {
        let body = self.build_chat_body(history);
        let start = Instant::now();

        let resp = self
            .authed_post(&self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.provider_err(format!("timeout: {e}"))
                } else {
                    self.provider_err(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.provider_err(format!("chat returned {status}: {body}")));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| self.provider_err(format!("malformed response: {e}")))?;

        let new_messages = parse_chat_response(&parsed);
        if new_messages.is_empty() {
            return Err(self.provider_err("response contained no choices"));
        }

        TraceEvent::ProviderCall {
            provider: self.id.clone(),
            model: self.model.clone(),
            sent_messages: history.len(),
            received_messages: new_messages.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(new_messages)
    }

    fn truncate(&self, history: &[Message]) -> Vec<Message> {
        truncate_window(history, self.max_history_messages)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// `is_context` never leaves the process: injected context travels as a
/// plain system message on the wire.
fn msg_to_wire(msg: &Message) -> Value {
    serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    })
}

fn parse_chat_response(parsed: &Value) -> Vec<Message> {
    let choices = match parsed.get("choices").and_then(Value::as_array) {
        Some(c) => c,
        None => return Vec::new(),
    };
    choices
        .iter()
        .filter_map(|c| c.pointer("/message/content"))
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(Message::assistant)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Priming + truncation policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn render_template(template: &str, ctx: &PrimingContext) -> String {
    template
        .replace("{conversation}", &ctx.conversation_title)
        .replace("{user}", &ctx.user_display_name)
}

/// Length of the leading priming prefix: the run of plain (non-context)
/// system messages at the head of the history.
fn priming_prefix_len(history: &[Message]) -> usize {
    history
        .iter()
        .take_while(|m| m.role == Role::System && !m.is_context)
        .count()
}

/// Keep the priming prefix plus the most recent `max` messages of the rest.
/// Stale injected-context messages fall out of the window first by virtue
/// of appearing before the turns that follow them. Applying this twice is
/// a no-op: the prefix is preserved verbatim and the tail length only ever
/// shrinks to `max`.
pub fn truncate_window(history: &[Message], max: usize) -> Vec<Message> {
    let prefix = priming_prefix_len(history);
    let tail = &history[prefix..];

    let mut out = Vec::with_capacity(prefix + tail.len().min(max));
    out.extend_from_slice(&history[..prefix]);
    if tail.len() > max {
        out.extend_from_slice(&tail[tail.len() - max..]);
    } else {
        out.extend_from_slice(tail);
    }
    out
}
