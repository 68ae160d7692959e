//! Core runtime — the turn state machine that ties session state, prompt
//! assembly, retrieval, the provider call, and persistence into one
//! sequential flow.

pub mod assemble;
pub mod conversation_lock;
pub mod turn;

pub use turn::{cancel, restart, submit_turn, transcript_view, TurnRequest, TurnResult, TurnStatus};
