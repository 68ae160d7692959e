//! External collaborator contracts and adapters: the generative-model
//! provider (`ProviderClient`) and the document retriever
//! (`RetrievalClient`), plus the registry that instantiates configured
//! providers at startup.

pub mod openai_compat;
pub mod registry;
pub mod retrieval;
pub mod traits;

pub use registry::ProviderRegistry;
pub use retrieval::{RestRetrievalClient, RetrievalClient, RetrievedDocument, SearchScope};
pub use traits::{PrimingContext, ProviderClient};
