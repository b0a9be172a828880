use crate::auth::{ConfiguredCapabilities, StaticIdentityResolver};
use crate::services::TreeService;
use arbor_config::ArborConfig;
use arbor_core::{
    CapabilityChecker, FieldContent, IdentityResolver, NodeTypeRegistry, TreeMetadataManager,
};
use arbor_llm::{CompletionProvider, OpenAiCompatibleProvider};
use arbor_sync::{DocumentRegistry, SyncGateway};
use std::sync::Arc;

/// Shared state handed to every handler. Registries are constructed here
/// rather than held in globals, so each router owns an isolated set.
#[derive(Clone)]
pub struct AppState {
    pub trees: Arc<TreeService>,
    pub gateway: Arc<SyncGateway>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub config: Arc<ArborConfig>,
}

impl AppState {
    /// Wire the services with explicit collaborators
    pub fn new(
        config: ArborConfig,
        resolver: Arc<dyn IdentityResolver>,
        checker: Arc<dyn CapabilityChecker>,
        provider: Arc<dyn CompletionProvider>,
        node_types: NodeTypeRegistry,
    ) -> Self {
        let registry = Arc::new(DocumentRegistry::new(config.sync.broadcast_capacity));
        let metadata = Arc::new(TreeMetadataManager::new());
        let gateway = Arc::new(SyncGateway::new(
            Arc::clone(&registry),
            Arc::clone(&metadata),
            config.sync.gc_enabled,
        ));
        let trees = Arc::new(TreeService::new(
            registry,
            metadata,
            checker,
            provider,
            node_types,
            config.sync.gc_enabled,
        ));

        Self {
            trees,
            gateway,
            resolver,
            config: Arc::new(config),
        }
    }

    /// Production wiring: config-backed auth, the configured completion
    /// endpoint, and plain-text nodes
    pub fn from_config(config: ArborConfig) -> Self {
        let resolver = Arc::new(StaticIdentityResolver::from_config(&config.auth));
        let checker = Arc::new(ConfiguredCapabilities::from_config(&config.auth));
        let provider = Arc::new(OpenAiCompatibleProvider::from_config(&config.llm));
        Self::new(config, resolver, checker, provider, default_node_types())
    }
}

/// Node types understood out of the box
pub fn default_node_types() -> NodeTypeRegistry {
    NodeTypeRegistry::new().with("text", Arc::new(FieldContent::new("content")))
}
