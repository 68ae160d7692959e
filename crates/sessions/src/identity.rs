//! Conversation → binding resolution.
//!
//! Maps a conversation id to the provider and authorized search scope that
//! apply to it. Bindings come from configuration only; the end user never
//! supplies them. An optional default binding covers conversations with no
//! explicit entry.

use std::collections::HashMap;

use cc_domain::config::ConversationBinding;
use cc_domain::error::{Error, Result};

/// Resolves which provider configuration and authorized corpus apply to a
/// conversation.
#[derive(Debug, Clone)]
pub struct BindingResolver {
    bindings: HashMap<String, ConversationBinding>,
    default_binding: Option<ConversationBinding>,
}

impl BindingResolver {
    pub fn from_config(
        bindings: &[ConversationBinding],
        default_binding: Option<ConversationBinding>,
    ) -> Self {
        let map = bindings
            .iter()
            .map(|b| (b.conversation_id.clone(), b.clone()))
            .collect();
        Self { bindings: map, default_binding }
    }

    /// Resolve the binding for a conversation. Falls back to the default
    /// binding (with the conversation id filled in) when no explicit entry
    /// exists.
    pub fn resolve(&self, conversation_id: &str) -> Result<ConversationBinding> {
        if let Some(binding) = self.bindings.get(conversation_id) {
            return Ok(binding.clone());
        }
        if let Some(default) = &self.default_binding {
            let mut binding = default.clone();
            binding.conversation_id = conversation_id.to_owned();
            if binding.title.is_empty() {
                binding.title = conversation_id.to_owned();
            }
            return Ok(binding);
        }
        Err(Error::NotFound(format!(
            "no binding for conversation '{conversation_id}'"
        )))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
