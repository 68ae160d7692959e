//! Integration tests for the turn runtime — full round-trip without any
//! external chat or search service.
//!
//! Provider and retrieval collaborators are replaced with in-process mocks
//! so every test is deterministic and exercises the real store, lock map,
//! assembly, and truncation paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use cc_domain::config::{Config, ConversationBinding, HistoryConfig, StateConfig, TurnConfig};
use cc_domain::error::{Error, Result};
use cc_domain::message::{Message, Role};
use cc_gateway::runtime::conversation_lock::ConversationLockMap;
use cc_gateway::runtime::{self, TurnRequest, TurnStatus};
use cc_gateway::state::AppState;
use cc_providers::openai_compat::truncate_window;
use cc_providers::registry::ProviderRegistry;
use cc_providers::retrieval::{RetrievalClient, RetrievedDocument, SearchScope, UserSettings};
use cc_providers::traits::{PrimingContext, ProviderClient};
use cc_sessions::compute_session_key;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mocks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct MockProvider {
    reply: String,
    max_history: usize,
    fail: AtomicBool,
    chat_calls: AtomicUsize,
}

impl MockProvider {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            max_history: 40,
            fail: AtomicBool::new(false),
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn with_max_history(reply: &str, max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::new(reply)
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for MockProvider {
    async fn generate_priming(&self, ctx: &PrimingContext) -> Result<Vec<Message>> {
        Ok(vec![Message::system(format!(
            "You are the assistant for {}.",
            ctx.conversation_title
        ))])
    }

    async fn chat(&self, _history: &[Message]) -> Result<Vec<Message>> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ProviderUnavailable {
                provider: "mock".into(),
                message: "simulated outage".into(),
            });
        }
        Ok(vec![Message::assistant(&self.reply)])
    }

    fn truncate(&self, history: &[Message]) -> Vec<Message> {
        truncate_window(history, self.max_history)
    }

    fn provider_id(&self) -> &str {
        "mock"
    }

    fn display_name(&self) -> &str {
        "Tutor"
    }
}

struct MockRetrieval {
    documents: Vec<RetrievedDocument>,
    fail: AtomicBool,
    seen_scopes: parking_lot::Mutex<Vec<SearchScope>>,
}

impl MockRetrieval {
    fn with_documents(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            fail: AtomicBool::new(false),
            seen_scopes: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn empty() -> Self {
        Self::with_documents(Vec::new())
    }

    fn failing() -> Self {
        let m = Self::empty();
        m.fail.store(true, Ordering::SeqCst);
        m
    }
}

#[async_trait::async_trait]
impl RetrievalClient for MockRetrieval {
    async fn search(
        &self,
        _query: &str,
        scope: &SearchScope,
        _settings: &UserSettings,
    ) -> Result<Vec<RetrievedDocument>> {
        self.seen_scopes.lock().push(scope.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::RetrievalUnavailable("search backend down".into()));
        }
        Ok(self.documents.clone())
    }
}

fn doc(title: &str, content: &str) -> RetrievedDocument {
    RetrievedDocument {
        title: title.to_owned(),
        source_url: format!("https://example.org/{title}"),
        content: content.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    state: AppState,
    provider: Arc<MockProvider>,
    retrieval: Arc<MockRetrieval>,
    _dir: TempDir,
}

fn harness(provider: MockProvider, retrieval: MockRetrieval, turn: TurnConfig) -> Harness {
    let dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.state = StateConfig {
        path: dir.path().join("state"),
    };
    config.turn = turn;
    config.history = HistoryConfig {
        max_messages: provider.max_history,
    };
    config.conversations = vec![ConversationBinding {
        conversation_id: "econ-101".into(),
        title: "Economics 101".into(),
        provider_id: "mock".into(),
        corpus_ids: vec!["econ-notes".into()],
        user_settings: HashMap::new(),
    }];

    let provider = Arc::new(provider);
    let retrieval = Arc::new(retrieval);

    let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
    providers.insert("mock".into(), provider.clone());

    let store = cc_sessions::ConversationStore::new(&config.state.path).unwrap();
    let bindings =
        cc_sessions::BindingResolver::from_config(&config.conversations, None);

    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        bindings: Arc::new(bindings),
        providers: Arc::new(ProviderRegistry::from_providers(providers)),
        retrieval: retrieval.clone() as Arc<dyn RetrievalClient>,
        locks: Arc::new(ConversationLockMap::new()),
    };

    Harness {
        state,
        provider,
        retrieval,
        _dir: dir,
    }
}

fn default_turn_config() -> TurnConfig {
    TurnConfig {
        degrade_on_retrieval_failure: true,
        debug_history: false,
    }
}

fn turn_req(message: &str) -> TurnRequest {
    TurnRequest {
        conversation_id: "econ-101".into(),
        user_id: "u7".into(),
        display_name: Some("Ada".into()),
        message: message.to_owned(),
    }
}

fn session_key() -> String {
    compute_session_key("econ-101", "u7")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Priming and log growth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn first_turn_primes_state_and_grows_both_logs() {
    let h = harness(
        MockProvider::new("Supply meets demand."),
        MockRetrieval::with_documents(vec![doc("Lecture 1", "Markets clear at equilibrium.")]),
        default_turn_config(),
    );

    let result = runtime::submit_turn(&h.state, turn_req("What is equilibrium?"))
        .await
        .unwrap();

    assert_eq!(result.status, TurnStatus::Completed);

    let stored = h.state.store.load(&session_key()).unwrap();
    // priming + context + user + assistant
    assert_eq!(stored.history.len(), 4);
    assert_eq!(stored.history[0].role, Role::System);
    assert!(stored.history[0].content.contains("Economics 101"));
    // user question + assistant answer, never the context message
    assert_eq!(stored.transcript.len(), 2);
    assert_eq!(stored.transcript[0].speaker, "Ada");
    assert_eq!(stored.transcript[1].speaker, "Tutor");
    assert_eq!(stored.transcript[1].content, "Supply meets demand.");
}

#[tokio::test]
async fn context_message_sits_immediately_before_user_message() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::with_documents(vec![
            doc("Lecture 1", "Markets clear."),
            doc("Lecture 2", "Elasticity measures response."),
        ]),
        default_turn_config(),
    );

    runtime::submit_turn(&h.state, turn_req("Explain elasticity"))
        .await
        .unwrap();

    let stored = h.state.store.load(&session_key()).unwrap();
    let n = stored.history.len();
    let context = &stored.history[n - 3];
    let user = &stored.history[n - 2];

    assert!(context.is_context);
    assert_eq!(context.role, Role::System);
    assert!(context.content.contains("Lecture 1"));
    assert!(context.content.contains("Lecture 2"));
    assert!(!user.is_context);
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "Explain elasticity");
}

#[tokio::test]
async fn zero_documents_means_no_context_message() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    let result = runtime::submit_turn(&h.state, turn_req("hello"))
        .await
        .unwrap();

    assert_eq!(result.status, TurnStatus::Completed);
    let stored = h.state.store.load(&session_key()).unwrap();
    assert!(stored.history.iter().all(|m| !m.is_context));
    assert_eq!(stored.history.len(), 3);
}

#[tokio::test]
async fn retrieval_scope_comes_from_the_binding() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();

    let scopes = h.retrieval.seen_scopes.lock();
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0].provider_id, "mock");
    assert_eq!(scopes[0].corpus_ids, vec!["econ-notes".to_string()]);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn retrieval_outage_degrades_to_plain_chat() {
    let h = harness(
        MockProvider::new("Answered without notes."),
        MockRetrieval::failing(),
        default_turn_config(),
    );

    let result = runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();

    assert_eq!(result.status, TurnStatus::DegradedNoRetrieval);
    let stored = h.state.store.load(&session_key()).unwrap();
    assert!(stored.history.iter().all(|m| !m.is_context));
    assert_eq!(stored.transcript.len(), 2);
}

#[tokio::test]
async fn retrieval_outage_aborts_when_degrade_is_disabled() {
    let h = harness(
        MockProvider::new("never sent"),
        MockRetrieval::failing(),
        TurnConfig {
            degrade_on_retrieval_failure: false,
            debug_history: false,
        },
    );

    let err = runtime::submit_turn(&h.state, turn_req("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)));

    // The provider was never called and nothing past priming was stored.
    assert_eq!(h.provider.chat_calls.load(Ordering::SeqCst), 0);
    let stored = h.state.store.load(&session_key()).unwrap();
    assert_eq!(stored.history.len(), 1);
    assert!(stored.transcript.is_empty());
}

#[tokio::test]
async fn provider_failure_leaves_stored_state_untouched() {
    let h = harness(
        MockProvider::new("first answer"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    runtime::submit_turn(&h.state, turn_req("first question"))
        .await
        .unwrap();
    let before = serde_json::to_value(h.state.store.load(&session_key()).unwrap()).unwrap();

    h.provider.fail.store(true, Ordering::SeqCst);
    let err = runtime::submit_turn(&h.state, turn_req("second question"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { .. }));

    let after = serde_json::to_value(h.state.store.load(&session_key()).unwrap()).unwrap();
    assert_eq!(before, after);

    // The failed turn's user message must not resurface on the next one.
    h.provider.fail.store(false, Ordering::SeqCst);
    runtime::submit_turn(&h.state, turn_req("third question"))
        .await
        .unwrap();
    let stored = h.state.store.load(&session_key()).unwrap();
    assert!(stored
        .history
        .iter()
        .all(|m| m.content != "second question"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Restart and cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn restart_clears_both_logs_and_rotates_the_state_id() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();
    let old = h.state.store.load(&session_key()).unwrap();

    runtime::restart(&h.state, "econ-101", "u7").await.unwrap();
    let fresh = h.state.store.load(&session_key()).unwrap();

    assert_ne!(fresh.state_id, old.state_id);
    assert_eq!(fresh.history.len(), 1);
    assert_eq!(fresh.history[0].role, Role::System);
    assert!(fresh.transcript.is_empty());
}

#[tokio::test]
async fn cancel_resets_history_but_keeps_the_transcript() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();
    let before = h.state.store.load(&session_key()).unwrap();
    assert_eq!(before.transcript.len(), 2);

    runtime::cancel(&h.state, "econ-101", "u7").await.unwrap();
    let after = h.state.store.load(&session_key()).unwrap();

    assert_eq!(after.history.len(), 1);
    assert_eq!(after.transcript.len(), 2);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Truncation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn history_stays_bounded_across_many_turns() {
    let h = harness(
        MockProvider::with_max_history("ok", 4),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    for i in 0..6 {
        runtime::submit_turn(&h.state, turn_req(&format!("question {i}")))
            .await
            .unwrap();
    }

    let stored = h.state.store.load(&session_key()).unwrap();
    // priming prefix + the 4-message tail window
    assert!(stored.history.len() <= 5);
    assert_eq!(stored.history[0].role, Role::System);
    assert!(stored.history[0].content.contains("Economics 101"));
    // the transcript is never truncated
    assert_eq!(stored.transcript.len(), 12);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Concurrency
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn concurrent_turns_for_the_same_key_serialize() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    let (a, b) = tokio::join!(
        runtime::submit_turn(&h.state, turn_req("first")),
        runtime::submit_turn(&h.state, turn_req("second")),
    );
    a.unwrap();
    b.unwrap();

    let stored = h.state.store.load(&session_key()).unwrap();
    let users = stored
        .history
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    assert_eq!(users, 2);
    assert_eq!(stored.transcript.len(), 4);
    assert_eq!(h.provider.chat_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transcript_entries_are_chronological() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    for i in 0..3 {
        runtime::submit_turn(&h.state, turn_req(&format!("q{i}")))
            .await
            .unwrap();
    }

    let stored = h.state.store.load(&session_key()).unwrap();
    for pair in stored.transcript.windows(2) {
        assert!(pair[0].at <= pair[1].at);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// First view and debug gating
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn transcript_view_initializes_on_first_access() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    let conv = runtime::transcript_view(&h.state, "econ-101", "u7")
        .await
        .unwrap();

    assert!(conv.transcript.is_empty());
    assert_eq!(conv.history.len(), 1);
    assert_eq!(conv.history[0].role, Role::System);
    // a second view returns the same state
    let again = runtime::transcript_view(&h.state, "econ-101", "u7")
        .await
        .unwrap();
    assert_eq!(again.state_id, conv.state_id);
}

#[tokio::test]
async fn debug_history_is_absent_by_default() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    let result = runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();
    assert!(result.debug_history.is_none());
}

#[tokio::test]
async fn debug_history_is_returned_when_enabled() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        TurnConfig {
            degrade_on_retrieval_failure: true,
            debug_history: true,
        },
    );

    let result = runtime::submit_turn(&h.state, turn_req("q")).await.unwrap();
    let history = result.debug_history.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, Role::System);
}

#[tokio::test]
async fn unknown_conversation_is_rejected() {
    let h = harness(
        MockProvider::new("ok"),
        MockRetrieval::empty(),
        default_turn_config(),
    );

    let err = runtime::submit_turn(
        &h.state,
        TurnRequest {
            conversation_id: "nope".into(),
            user_id: "u7".into(),
            display_name: None,
            message: "q".into(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}
