use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub conversations: Vec<ConversationBinding>,
    /// Fallback binding applied to conversations with no explicit entry.
    #[serde(default)]
    pub default_binding: Option<ConversationBinding>,
}

impl Config {
    /// Cross-section validation: every binding must reference a configured
    /// provider, and at least one provider must exist.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::Config("no [[providers]] configured".into()));
        }
        let ids: Vec<&str> = self.providers.iter().map(|p| p.id.as_str()).collect();
        for binding in self
            .conversations
            .iter()
            .chain(self.default_binding.iter())
        {
            if !ids.contains(&binding.provider_id.as_str()) {
                return Err(Error::Config(format!(
                    "conversation '{}' references unknown provider '{}'",
                    binding.conversation_id, binding.provider_id
                )));
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: d_port(), host: d_host() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding `conversations.json`.
    #[serde(default = "d_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { path: d_state_path() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retrieval service connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "d_retrieval_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: d_retrieval_url(),
            api_key: None,
            timeout_ms: 8000,
            max_retries: 2,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// When retrieval fails, fall back to plain chat (no context injection)
    /// instead of aborting the turn.
    #[serde(default = "d_true")]
    pub degrade_on_retrieval_failure: bool,
    /// Attach the raw provider-facing history to turn results. Diagnostic
    /// only; must stay off in production deployments.
    #[serde(default)]
    pub debug_history: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { degrade_on_retrieval_failure: true, debug_history: false }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History bound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum non-priming messages retained after truncation.
    #[serde(default = "d_40")]
    pub max_messages: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_messages: 40 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier bindings refer to (e.g. `"openai"`).
    pub id: String,
    /// Display name shown as the speaker label in transcripts.
    #[serde(default = "d_provider_name")]
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_120000")]
    pub timeout_ms: u64,
    /// Priming templates rendered into the initial system messages.
    /// `{conversation}` and `{user}` placeholders are substituted.
    #[serde(default)]
    pub priming: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation bindings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which provider and search scope apply to one conversation.
///
/// These values are never trusted to the end user; they come from
/// configuration only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBinding {
    #[serde(default)]
    pub conversation_id: String,
    /// Human title, substituted into priming templates.
    #[serde(default)]
    pub title: String,
    pub provider_id: String,
    /// Authorized corpus ids the retrieval scope is limited to.
    #[serde(default)]
    pub corpus_ids: Vec<String>,
    /// Per-conversation retrieval settings passed through to the search
    /// service verbatim.
    #[serde(default)]
    pub user_settings: HashMap<String, String>,
}

// ── serde default helpers ──────────────────────────────────────────

fn d_port() -> u16 {
    8330
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./state")
}
fn d_retrieval_url() -> String {
    "http://127.0.0.1:8983".into()
}
fn d_8000() -> u64 {
    8000
}
fn d_120000() -> u64 {
    120_000
}
fn d_2() -> u32 {
    2
}
fn d_40() -> usize {
    40
}
fn d_true() -> bool {
    true
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_provider_name() -> String {
    "Assistant".into()
}
