//! Shared leaf types for CourseChat: the provider-facing message shape,
//! the display-facing transcript entry, configuration, errors, and
//! structured trace events.

pub mod config;
pub mod error;
pub mod message;
pub mod trace;

pub use error::{Error, Result};
pub use message::{DisplayMessage, Message, Role};
