//! The completion backend adapter.
//!
//! Wraps a [`Provider`] behind the narrow call the orchestrator needs:
//! system prompt plus messages in, reply text out. Each call is bounded by
//! a timeout and never retried; a caller that gets an error takes its
//! deterministic path instead.

use gradwise_core::error::ProviderError;
use gradwise_core::message::Message;
use gradwise_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CompletionBackend {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl CompletionBackend {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion and return the reply text.
    ///
    /// An empty reply counts as malformed.
    pub async fn complete(
        &self,
        system_prompt: &str,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(Message::system(system_prompt));
        all.extend(messages);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: all,
            temperature,
            max_tokens: Some(max_tokens),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            })??;

        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse("empty completion".into()));
        }
        debug!(provider = %self.provider.name(), model = %response.model, chars = text.len(), "Completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use gradwise_core::message::Role;

    #[tokio::test]
    async fn prepends_system_prompt_and_passes_limits() {
        let provider = Arc::new(ScriptedProvider::texts(&["  hello  "]));
        let backend = CompletionBackend::new(provider.clone(), "gpt-4o");

        let reply = backend
            .complete("be brief", vec![Message::user("hi")], 0.1, 500)
            .await
            .unwrap();
        assert_eq!(reply, "hello");

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, Some(500));
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "be brief");
        assert_eq!(request.messages[1].content, "hi");
    }

    #[tokio::test]
    async fn empty_reply_is_malformed() {
        let backend = CompletionBackend::new(Arc::new(ScriptedProvider::texts(&["   "])), "m");
        let err = backend.complete("s", vec![], 0.7, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn provider_errors_pass_through_without_retry() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited { retry_after_secs: 5 }),
            Ok("late".into()),
        ]));
        let backend = CompletionBackend::new(provider.clone(), "m");
        let err = backend.complete("s", vec![], 0.7, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider = Arc::new(ScriptedProvider::texts(&["too late"]).with_delay(Duration::from_secs(60)));
        let backend = CompletionBackend::new(provider, "m").with_timeout(Duration::from_secs(2));
        let err = backend.complete("s", vec![], 0.7, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
