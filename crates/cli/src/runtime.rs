//! Builds the running system from configuration.
//!
//! Backend availability is resolved here, once: a provider that cannot be
//! built (no key, `"none"`) is simply absent and every stage that would use
//! it takes its deterministic path.

use gradwise_agent::{CompletionBackend, ContextLimits, Orchestrator, OrchestratorSettings, SessionRegistry};
use gradwise_config::AppConfig;
use gradwise_core::event::EventBus;
use gradwise_core::memory::RetrievalStore;
use gradwise_memory::{LocalStore, NoopStore};
use gradwise_providers::{ProviderEmbedder, ProviderRouter, build_from_config};
use gradwise_tools::{RecordBook, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<dyn RetrievalStore>,
    pub sessions: SessionRegistry,
    pub events: Arc<EventBus>,
    pub backend: Option<CompletionBackend>,
}

impl Runtime {
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = build_from_config(&config);
        let store = build_store(&config, &router)?;
        let book = Arc::new(build_book(&config)?);
        let backend = build_backend(&config, &router);

        let tools = Arc::new(
            default_registry(book.clone()).with_timeout(Duration::from_secs(config.agent.tool_timeout_secs)),
        );
        let events = Arc::new(EventBus::default());
        let orchestrator = Orchestrator::new(store.clone(), book.clone(), tools, backend.clone())
            .with_events(events.clone())
            .with_settings(OrchestratorSettings::from(&config))
            .with_context_limits(ContextLimits::from(&config.context))
            .with_decision_sampling(config.agent.decision_temperature, config.agent.decision_max_tokens);
        let sessions = SessionRegistry::new(Arc::new(orchestrator)).with_window_capacity(config.agent.window_capacity);

        Ok(Self {
            config,
            store,
            sessions,
            events,
            backend,
        })
    }
}

pub fn build_store(config: &AppConfig, router: &ProviderRouter) -> Result<Arc<dyn RetrievalStore>, Box<dyn std::error::Error>> {
    let store = match config.memory.backend.as_str() {
        "none" => return Ok(Arc::new(NoopStore)),
        "in_memory" => LocalStore::in_memory(),
        _ => {
            let path = config.memory.resolved_path();
            debug!(path = %path.display(), "Opening memory journal");
            LocalStore::open(path).map_err(|e| format!("Failed to open memory store: {e}"))?
        }
    };

    let embedding = &config.memory.embedding_provider;
    if embedding == "none" {
        return Ok(Arc::new(store));
    }
    match router.get(embedding) {
        Some(provider) => {
            let embedder = ProviderEmbedder::new(provider, &config.memory.embedding_model)
                .with_timeout(Duration::from_secs(config.agent.embed_timeout_secs));
            Ok(Arc::new(store.with_embedder(Arc::new(embedder))))
        }
        None => {
            info!(provider = %embedding, "Embedding provider unavailable; lexical retrieval only");
            Ok(Arc::new(store))
        }
    }
}

fn build_book(config: &AppConfig) -> Result<RecordBook, Box<dyn std::error::Error>> {
    if !config.records.persist {
        return Ok(RecordBook::in_memory());
    }
    let path = config.records.resolved_path();
    Ok(RecordBook::open(path).map_err(|e| format!("Failed to open records: {e}"))?)
}

fn build_backend(config: &AppConfig, router: &ProviderRouter) -> Option<CompletionBackend> {
    let provider = router.default()?;
    Some(
        CompletionBackend::new(provider, &config.default_model)
            .with_timeout(Duration::from_secs(config.agent.backend_timeout_secs)),
    )
}
