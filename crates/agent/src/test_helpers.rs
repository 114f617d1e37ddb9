//! Shared test doubles for agent tests.

use gradwise_core::error::ProviderError;
use gradwise_core::message::Message;
use gradwise_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A provider that replays scripted replies in order and records every
/// request it receives.
///
/// Once the script runs out every call fails with `NotConfigured`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Every call fails as if the endpoint were unreachable.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model,
            }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::NotConfigured("script exhausted".into())),
        }
    }
}
