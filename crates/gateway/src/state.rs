use std::sync::Arc;

use cc_domain::config::Config;
use cc_domain::error::Result;
use cc_providers::registry::ProviderRegistry;
use cc_providers::retrieval::{RestRetrievalClient, RetrievalClient};
use cc_sessions::{BindingResolver, ConversationStore};

use crate::runtime::conversation_lock::ConversationLockMap;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ConversationStore>,
    pub bindings: Arc<BindingResolver>,
    pub providers: Arc<ProviderRegistry>,
    pub retrieval: Arc<dyn RetrievalClient>,
    pub locks: Arc<ConversationLockMap>,
}

impl AppState {
    /// Wire up all services from a validated config.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let store = Arc::new(ConversationStore::new(&config.state.path)?);
        let bindings = Arc::new(BindingResolver::from_config(
            &config.conversations,
            config.default_binding.clone(),
        ));
        let providers = Arc::new(ProviderRegistry::from_config(&config)?);
        let retrieval: Arc<dyn RetrievalClient> =
            Arc::new(RestRetrievalClient::new(&config.retrieval)?);

        Ok(Self {
            config,
            store,
            bindings,
            providers,
            retrieval,
            locks: Arc::new(ConversationLockMap::new()),
        })
    }
}
