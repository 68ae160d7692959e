use serde::Serialize;

/// Structured trace events emitted across all CourseChat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    StateInitialized {
        session_key: String,
        state_id: String,
        priming_messages: usize,
    },
    StateReset {
        session_key: String,
        old_state_id: String,
        new_state_id: String,
        transcript_cleared: bool,
    },
    RetrievalCall {
        endpoint: String,
        status: u16,
        hits: usize,
        duration_ms: u64,
    },
    ProviderCall {
        provider: String,
        model: String,
        sent_messages: usize,
        received_messages: usize,
        duration_ms: u64,
    },
    HistoryTruncated {
        session_key: String,
        before: usize,
        after: usize,
    },
    TurnCompleted {
        session_key: String,
        documents: usize,
        degraded: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cc_event");
    }
}
