//! CourseChat gateway — the session engine binary.
//!
//! Orchestrates retrieval-augmented chat turns over per-user, per-conversation
//! state and exposes them through a small HTTP API (the hosting boundary).

pub mod api;
pub mod cli;
pub mod runtime;
pub mod state;
