//! The turn orchestrator.
//!
//! Runs one message through OBSERVE → DECIDE → ACT → RESPOND → STORE:
//!
//! 1. **Observe**: read the structured-state summary and assemble memory
//!    context within the token budget
//! 2. **Decide**: ask the decision engine for a tool (or none)
//! 3. **Act**: dispatch the chosen tool; skipped when there is none
//! 4. **Respond**: have the backend write the reply, or format one from the
//!    tool result when the backend is absent or fails
//! 5. **Store**: persist the exchange and any tool artifact, then append it
//!    to the session window
//!
//! No failure inside a stage aborts the turn. Each degraded stage logs a
//! warning and publishes a [`DomainEvent::FallbackEngaged`].

use crate::backend::CompletionBackend;
use crate::context::{AssembledContext, ContextAssembler, ContextLimits};
use crate::decision::DecisionEngine;
use crate::window::ConversationWindow;
use chrono::Utc;
use gradwise_config::AppConfig;
use gradwise_core::event::{DomainEvent, EventBus};
use gradwise_core::memory::{Metadata, RecordKind, RetrievalStore};
use gradwise_core::message::{Message, truncate_chars};
use gradwise_core::state::{StateReader, StateSummary};
use gradwise_core::tool::{ToolInvocation, ToolRegistry};
use gradwise_core::turn::{Stage, Turn, TurnReply};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Chars of the user message and reply kept in conversation metadata.
const METADATA_CHARS: usize = 500;
/// Chars of each tool description listed in the response prompt.
const TOOL_DESCRIPTION_CHARS: usize = 100;

/// Knobs for the stages that are not owned by a sub-component.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub context_budget: usize,
    pub response_temperature: f32,
    pub response_max_tokens: u32,
    pub state_timeout: Duration,
    pub tool_result_chars: usize,
    pub state_summary_chars: usize,
    pub deadline_days: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            context_budget: 2000,
            response_temperature: 0.7,
            response_max_tokens: 1000,
            state_timeout: Duration::from_secs(5),
            tool_result_chars: 1000,
            state_summary_chars: 2000,
            deadline_days: 14,
        }
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            context_budget: config.context.budget,
            response_temperature: config.agent.response_temperature,
            response_max_tokens: config.agent.response_max_tokens,
            state_timeout: Duration::from_secs(config.agent.state_timeout_secs),
            tool_result_chars: config.agent.tool_result_chars,
            state_summary_chars: config.agent.state_summary_chars,
            deadline_days: config.agent.deadline_days,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn RetrievalStore>,
    state: Arc<dyn StateReader>,
    tools: Arc<ToolRegistry>,
    assembler: ContextAssembler,
    decisions: DecisionEngine,
    backend: Option<CompletionBackend>,
    events: Arc<EventBus>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Wire up a turn loop. `backend` is `None` when no completion backend
    /// is reachable; every stage then takes its deterministic path.
    pub fn new(
        store: Arc<dyn RetrievalStore>,
        state: Arc<dyn StateReader>,
        tools: Arc<ToolRegistry>,
        backend: Option<CompletionBackend>,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(store.clone()),
            decisions: DecisionEngine::new(backend.clone(), tools.definitions()),
            store,
            state,
            tools,
            backend,
            events: Arc::new(EventBus::default()),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.assembler = self.assembler.with_limits(limits);
        self
    }

    /// Sampling for the decision call.
    pub fn with_decision_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.decisions = self.decisions.with_sampling(temperature, max_tokens);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn RetrievalStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Process one message. The caller serializes turns per session.
    pub async fn run_turn(&self, session_id: &str, message: &str, window: &mut ConversationWindow) -> TurnReply {
        let started = Instant::now();
        let mut turn = Turn::begin(session_id, message);
        info!(session_id = %session_id, "Turn started");
        self.events.publish(DomainEvent::TurnStarted {
            session_id: session_id.to_string(),
            message_preview: truncate_chars(message, 100).to_string(),
            timestamp: Utc::now(),
        });

        // OBSERVE
        let summary = self.observe_state().await;
        let context = self
            .assembler
            .build(message, window, self.settings.context_budget)
            .await;
        turn.step(Stage::Observe, observe_note(&context));

        // DECIDE
        let decision = self.decisions.decide(message, &context.text).await;
        if let Some(reason) = &decision.fallback_reason {
            self.fallback(Stage::Decide, reason);
        }
        self.events.publish(DomainEvent::DecisionMade {
            session_id: session_id.to_string(),
            path: decision.path,
            tool_name: decision.outcome.tool_name().map(str::to_string),
            timestamp: Utc::now(),
        });
        let decide_note = match decision.outcome.tool_name() {
            Some(name) => format!("use {name} ({})", decision.path.as_str()),
            None => format!("answer directly ({})", decision.path.as_str()),
        };
        turn.step(Stage::Decide, decide_note);

        // ACT
        if let Some(name) = decision.outcome.tool_name() {
            let invocation = self.tools.dispatch(name, decision.outcome.arguments().clone()).await;
            self.events.publish(DomainEvent::ToolExecuted {
                tool_name: invocation.name.clone(),
                success: invocation.result.is_success(),
                duration_ms: invocation.duration_ms,
                timestamp: Utc::now(),
            });
            let act_note = match invocation.result.error() {
                None => format!("{} succeeded in {} ms", invocation.name, invocation.duration_ms),
                Some(error) => format!("{} failed: {error}", invocation.name),
            };
            turn.step(Stage::Act, act_note);
            turn.invocations.push(invocation);
        }

        // RESPOND
        let (response, respond_note) = self
            .respond(message, &context, &summary, &turn.invocations)
            .await;
        turn.response = response;
        turn.step(Stage::Respond, respond_note);

        // STORE
        let stored = self.persist(&turn).await;
        window.push_exchange(message, turn.response.clone());
        turn.step(Stage::Store, format!("{stored} records stored"));

        let reply = turn.finish();
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id = %session_id,
            tools = ?reply.tools_used,
            duration_ms,
            "Turn completed"
        );
        self.events.publish(DomainEvent::TurnCompleted {
            session_id: session_id.to_string(),
            tools_used: reply.tools_used.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });
        reply
    }

    async fn observe_state(&self) -> StateSummary {
        let collect = StateSummary::collect(self.state.as_ref(), self.settings.deadline_days);
        match tokio::time::timeout(self.settings.state_timeout, collect).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                self.fallback(Stage::Observe, &format!("state summary failed: {e}"));
                StateSummary::default()
            }
            Err(_) => {
                self.fallback(
                    Stage::Observe,
                    &format!("state summary timed out after {}s", self.settings.state_timeout.as_secs()),
                );
                StateSummary::default()
            }
        }
    }

    async fn respond(
        &self,
        message: &str,
        context: &AssembledContext,
        summary: &StateSummary,
        invocations: &[ToolInvocation],
    ) -> (String, String) {
        let Some(backend) = &self.backend else {
            return (fallback_response(message, invocations), "fallback formatter".into());
        };

        let system_prompt = self.response_prompt(context, summary);
        let user_content = self.response_request(message, invocations);
        match backend
            .complete(
                &system_prompt,
                vec![Message::user(user_content)],
                self.settings.response_temperature,
                self.settings.response_max_tokens,
            )
            .await
        {
            Ok(text) => (text, format!("reply from {}", backend.name())),
            Err(e) => {
                self.fallback(Stage::Respond, &e.to_string());
                (fallback_response(message, invocations), "fallback formatter".into())
            }
        }
    }

    fn response_prompt(&self, context: &AssembledContext, summary: &StateSummary) -> String {
        let tools = self
            .tools
            .definitions()
            .iter()
            .map(|t| format!("- {}: {}", t.name, truncate_chars(&t.description, TOOL_DESCRIPTION_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");
        let user_context = format!("{}\n\nCurrent State:\n{summary}", context.text);
        let today = chrono::Local::now().format("%B %d, %Y");

        format!(
            "You are Gradwise, an assistant that helps students manage their US graduate school applications.\n\n\
             You have access to the following tools:\n{tools}\n\n\
             When a tool result is provided, base your answer on it. Be specific and encouraging, \
             and use what you know from earlier conversations.\n\n\
             Current context about the user:\n{}\n\n\
             Today's date: {today}",
            truncate_chars(&user_context, self.settings.state_summary_chars)
        )
    }

    fn response_request(&self, message: &str, invocations: &[ToolInvocation]) -> String {
        if invocations.is_empty() {
            return message.to_string();
        }
        let mut results = String::from("Tool Results:\n");
        for invocation in invocations {
            let rendered = serde_json::to_string_pretty(&invocation.result.to_value()).unwrap_or_default();
            results.push_str(&format!(
                "Tool: {}\nResult: {}\n",
                invocation.name,
                truncate_chars(&rendered, self.settings.tool_result_chars)
            ));
        }
        format!("{message}\n\n{results}\nBased on the tool results above, provide a helpful response to the user.")
    }

    /// Write the conversation record and tool artifacts. Returns how many
    /// records were written.
    async fn persist(&self, turn: &Turn) -> usize {
        let mut stored = 0;

        let body = format!("User: {}\nAssistant: {}", turn.message, turn.response);
        let mut metadata = Metadata::new();
        metadata.insert("session_id".into(), turn.session_id.clone());
        metadata.insert("tools_used".into(), turn.tools_used().join(","));
        metadata.insert(
            "user_message".into(),
            truncate_chars(&turn.message, METADATA_CHARS).to_string(),
        );
        metadata.insert(
            "agent_response".into(),
            truncate_chars(&turn.response, METADATA_CHARS).to_string(),
        );
        if self.store_record(&body, RecordKind::Conversation, metadata).await {
            stored += 1;
        }

        for invocation in &turn.invocations {
            let Some(artifact) = &invocation.artifact else {
                continue;
            };
            let mut metadata: Metadata = artifact.tags.clone();
            metadata.insert("session_id".into(), turn.session_id.clone());
            metadata.insert("tool".into(), invocation.name.clone());
            if self.store_record(&artifact.body, RecordKind::DomainNote, metadata).await {
                stored += 1;
            }
        }
        stored
    }

    async fn store_record(&self, body: &str, kind: RecordKind, metadata: Metadata) -> bool {
        match self.store.store(body, kind, metadata).await {
            Ok(id) => {
                debug!(record_id = %id, kind = %kind, "Record stored");
                self.events.publish(DomainEvent::MemoryStored {
                    record_id: id,
                    kind: kind.as_str().to_string(),
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                self.fallback(Stage::Store, &format!("{kind} record not stored: {e}"));
                false
            }
        }
    }

    fn fallback(&self, stage: Stage, reason: &str) {
        warn!(stage = %stage, reason = %reason, "Falling back");
        self.events.publish(DomainEvent::FallbackEngaged {
            stage,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }
}

fn observe_note(context: &AssembledContext) -> String {
    format!(
        "context: {} messages, {} past conversations, {} preferences (~{} tokens)",
        context.messages, context.conversations, context.preferences, context.estimated_tokens
    )
}

/// The reply used when no backend can write one: the tool's own message
/// plus its notable result fields.
pub fn fallback_response(message: &str, invocations: &[ToolInvocation]) -> String {
    if invocations.is_empty() {
        return format!(
            "I understand you said: '{}'. How can I help you with your graduate school applications today?",
            truncate_chars(message, 100)
        );
    }

    let mut parts: Vec<String> = Vec::new();
    for invocation in invocations {
        if let Some(error) = invocation.result.error() {
            parts.push(format!("I encountered an issue: {error}"));
            continue;
        }

        let tool_message = invocation.result.message().filter(|m| !m.is_empty());
        if let Some(m) = tool_message {
            parts.push(m.to_string());
        }
        let Some(data) = invocation.result.data() else {
            continue;
        };
        if let Some(apps) = data.get("applications").and_then(|a| a.as_array()) {
            if !apps.is_empty() {
                parts.push(format!("You have {} applications.", apps.len()));
            }
        }
        if let Some(deadline) = data.get("deadline").and_then(|d| d.as_str()) {
            parts.push(format!("Deadline: {deadline}"));
        }
        if let Some(score) = data.get("overall_score").and_then(|s| s.as_u64()) {
            parts.push(format!("Essay score: {score}/100"));
        }
        if tool_message.is_none() {
            if let Some(count) = data.get("count").and_then(|c| c.as_u64()) {
                parts.push(format!("{count} items found."));
            }
        }
    }

    if parts.is_empty() {
        "I've processed your request. Is there anything else you'd like to know?".to_string()
    } else {
        parts.join(" ")
    }
}
