//! Document retrieval — the "R" of RAG.
//!
//! The engine hands the retriever a query plus an authorized scope and
//! trusts the documents that come back; it never widens the scope it was
//! given. `RestRetrievalClient` talks to a search service over HTTP with
//! retry + exponential back-off on transient (5xx / timeout) failures.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use cc_domain::config::RetrievalConfig;
use cc_domain::error::{Error, Result};
use cc_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A ranked document returned by the retriever, already scoped to the
/// caller's authorized corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub title: String,
    pub source_url: String,
    pub content: String,
}

/// The authorized search scope for one conversation. Built from the
/// conversation binding, never from user input.
#[derive(Debug, Clone, Serialize)]
pub struct SearchScope {
    pub provider_id: String,
    pub corpus_ids: Vec<String>,
}

/// Per-user retrieval settings passed through to the search service.
pub type UserSettings = HashMap<String, String>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// External collaborator contract: execute a scoped search.
///
/// Timeouts and errors surface as `Error::RetrievalUnavailable` — never as
/// a silent empty result, so the caller can apply its degradation policy
/// deliberately.
#[async_trait::async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        settings: &UserSettings,
    ) -> Result<Vec<RetrievedDocument>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REST client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    corpus_ids: &'a [String],
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    settings: &'a UserSettings,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<RetrievedDocument>,
}

/// A REST-based retrieval client.
///
/// Created once and reused for the lifetime of the process; the underlying
/// `reqwest::Client` maintains a connection pool.
#[derive(Debug, Clone)]
pub struct RestRetrievalClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl RestRetrievalClient {
    pub fn new(cfg: &RetrievalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            max_retries: cfg.max_retries,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/api/search", self.base_url)
    }

    fn decorate(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let rb = rb.header("X-Client-Type", "coursechat");
        match &self.api_key {
            Some(key) => rb.header("X-Api-Key", key),
            None => rb,
        }
    }

    /// Execute the search with retry + exponential back-off.
    ///
    /// * Retries on 5xx status codes and on timeouts.
    /// * Does **not** retry on 4xx (client errors are permanent).
    /// * Emits a `TraceEvent::RetrievalCall` after every attempt.
    async fn execute_with_retry(&self, body: &SearchRequest<'_>) -> Result<SearchResponse> {
        let url = self.search_url();
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_for(attempt)).await;
            }

            let start = Instant::now();
            let result = self.decorate(self.http.post(&url)).json(body).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if resp.status().is_server_error() {
                        // 5xx — transient, retry
                        TraceEvent::RetrievalCall {
                            endpoint: url.clone(),
                            status,
                            hits: 0,
                            duration_ms,
                        }
                        .emit();
                        let text = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::RetrievalUnavailable(format!(
                            "search returned {status}: {text}"
                        )));
                        continue;
                    }

                    if resp.status().is_client_error() {
                        // 4xx — permanent, do NOT retry
                        let text = resp.text().await.unwrap_or_default();
                        return Err(Error::RetrievalUnavailable(format!(
                            "search rejected ({status}): {text}"
                        )));
                    }

                    let parsed: SearchResponse = resp.json().await.map_err(|e| {
                        Error::RetrievalUnavailable(format!("malformed search response: {e}"))
                    })?;

                    TraceEvent::RetrievalCall {
                        endpoint: url.clone(),
                        status,
                        hits: parsed.documents.len(),
                        duration_ms,
                    }
                    .emit();

                    return Ok(parsed);
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(Error::RetrievalUnavailable(format!(
                        "search timed out: {e}"
                    )));
                    continue;
                }
                Err(e) => {
                    last_err = Some(Error::RetrievalUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::RetrievalUnavailable("search failed".into())))
    }
}

/// Exponential back-off before retry `attempt` (1-based), capped at 6.4s
/// so misconfigured retry counts cannot overflow or stall the turn.
fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(100 * (1u64 << (attempt - 1).min(6)))
}

#[async_trait::async_trait]
impl RetrievalClient for RestRetrievalClient {
    async fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        settings: &UserSettings,
    ) -> Result<Vec<RetrievedDocument>> {
        let body = SearchRequest {
            query,
            corpus_ids: &scope.corpus_ids,
            settings,
        };
        let resp = self.execute_with_retry(&body).await?;
        Ok(resp.documents)
    }
}
