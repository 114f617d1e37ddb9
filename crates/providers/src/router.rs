//! Provider router: selects the LLM provider named by config.

use crate::openai_compat::OpenAiCompatProvider;
use gradwise_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Routes requests to the configured provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The default provider, if it was buildable from config.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// All registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// A provider that needs an API key and has none is left out, so callers
/// see it as unavailable from the start rather than failing per call.
/// `"none"` is never registered.
pub fn build_from_config(config: &gradwise_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let mut names: Vec<String> = config.providers.keys().cloned().collect();
    if !names.contains(&config.default_provider) {
        names.push(config.default_provider.clone());
    }
    if !names.contains(&config.memory.embedding_provider) {
        names.push(config.memory.embedding_provider.clone());
    }

    for name in names {
        if name == "none" {
            continue;
        }

        let provider_config = config.providers.get(&name);
        let api_key = provider_config
            .and_then(|p| p.api_key.clone())
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        if api_key.is_empty() && requires_api_key(&name) {
            info!(provider = %name, "No API key configured; provider unavailable");
            continue;
        }

        let base_url = provider_config
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| default_base_url(&name));

        debug!(provider = %name, base_url = %base_url, "Registering provider");
        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(&name, &base_url, &api_key)),
        );
    }

    router
}

fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
