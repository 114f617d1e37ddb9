//! Budget-aware context assembly.
//!
//! Packs three sources into one prompt section, in priority order:
//!
//! | Stage | Source | Cap |
//! |-------|--------|-----|
//! | 1. Recent conversation | session window, newest first | 6 messages × 300 chars |
//! | 2. Related past conversations | retrieval store, `conversation` kind | 3 records × 400 chars |
//! | 3. User preferences | retrieval store, `preference` kind | 2 records × 200 chars |
//!
//! Items are taken greedily while the running token estimate stays within
//! the budget. The first item that does not fit ends assembly: later items
//! and stages are skipped even if they would fit. A stage heading is charged
//! together with that stage's first item.
//!
//! # Guarantees
//!
//! The estimate of the assembled text never exceeds the budget, and the
//! included items are always a prefix of the same priority order, so a
//! lower budget never includes more text.

use crate::context::token::{DEFAULT_TOKENS_PER_WORD, estimate_tokens};
use crate::window::ConversationWindow;
use gradwise_config::ContextConfig;
use gradwise_core::memory::{RecordKind, RetrievalStore, ScoredRecord};
use gradwise_core::message::truncate_chars;
use std::sync::Arc;
use tracing::{debug, warn};

const RECENT_HEADING: &str = "=== Recent Conversation ===";
const PAST_HEADING: &str = "=== Related Past Conversations ===";
const PREFERENCES_HEADING: &str = "=== User Preferences ===";

/// Per-stage caps and the token multiplier.
#[derive(Debug, Clone)]
pub struct ContextLimits {
    pub recent_messages: usize,
    pub message_chars: usize,
    pub conversation_records: usize,
    pub conversation_chars: usize,
    pub preference_records: usize,
    pub preference_chars: usize,
    pub tokens_per_word: f64,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            recent_messages: 6,
            message_chars: 300,
            conversation_records: 3,
            conversation_chars: 400,
            preference_records: 2,
            preference_chars: 200,
            tokens_per_word: DEFAULT_TOKENS_PER_WORD,
        }
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            recent_messages: config.recent_messages,
            message_chars: config.message_chars,
            conversation_records: config.conversation_records,
            conversation_chars: config.conversation_chars,
            preference_records: config.preference_records,
            preference_chars: config.preference_chars,
            tokens_per_word: config.tokens_per_word,
        }
    }
}

/// The packed context and what went into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    /// Sum of the per-item estimates charged against the budget.
    pub estimated_tokens: usize,
    pub messages: usize,
    pub conversations: usize,
    pub preferences: usize,
    /// An item was refused for lack of budget.
    pub exhausted: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Greedy prefix packing against a token budget.
struct Packer {
    budget: usize,
    tokens_per_word: f64,
    used: usize,
    exhausted: bool,
    sections: Vec<String>,
}

impl Packer {
    fn new(budget: usize, tokens_per_word: f64) -> Self {
        Self {
            budget,
            tokens_per_word,
            used: 0,
            exhausted: false,
            sections: Vec::new(),
        }
    }

    /// Accept the longest prefix of `items` that fits, charging `heading`
    /// with the first one.
    fn take(&mut self, heading: &str, items: Vec<String>) -> Vec<String> {
        let mut accepted = Vec::new();
        for item in items {
            if self.exhausted {
                break;
            }
            let mut cost = estimate_tokens(&item, self.tokens_per_word);
            if accepted.is_empty() {
                cost += estimate_tokens(heading, self.tokens_per_word);
            }
            if self.used + cost <= self.budget {
                self.used += cost;
                accepted.push(item);
            } else {
                self.exhausted = true;
            }
        }
        accepted
    }

    fn push_section(&mut self, heading: &str, items: &[String]) {
        if !items.is_empty() {
            self.sections.push(format!("{heading}\n{}", items.join("\n")));
        }
    }
}

/// Builds the memory section of a prompt from the session window and the
/// retrieval store.
pub struct ContextAssembler {
    store: Arc<dyn RetrievalStore>,
    limits: ContextLimits,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn RetrievalStore>) -> Self {
        Self {
            store,
            limits: ContextLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ContextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ContextLimits {
        &self.limits
    }

    /// Assemble context for `query` within `budget` tokens.
    pub async fn build(&self, query: &str, window: &ConversationWindow, budget: usize) -> AssembledContext {
        let limits = &self.limits;
        let mut packer = Packer::new(budget, limits.tokens_per_word);

        // Stage 1: newest messages have priority but render oldest first.
        let newest_first: Vec<String> = window
            .recent(limits.recent_messages)
            .rev()
            .map(|m| format!("{}: {}", m.role.label(), truncate_chars(&m.content, limits.message_chars)))
            .collect();
        let mut recent = packer.take(RECENT_HEADING, newest_first);
        recent.reverse();
        packer.push_section(RECENT_HEADING, &recent);

        // Stage 2.
        let mut conversations = 0;
        if !packer.exhausted {
            let records = self
                .retrieve(query, limits.conversation_records, RecordKind::Conversation)
                .await;
            let items = bodies(&records, limits.conversation_chars);
            let accepted = packer.take(PAST_HEADING, items);
            conversations = accepted.len();
            packer.push_section(PAST_HEADING, &accepted);
        }

        // Stage 3.
        let mut preferences = 0;
        if !packer.exhausted {
            let records = self
                .retrieve(query, limits.preference_records, RecordKind::Preference)
                .await;
            let items = bodies(&records, limits.preference_chars);
            let accepted = packer.take(PREFERENCES_HEADING, items);
            preferences = accepted.len();
            packer.push_section(PREFERENCES_HEADING, &accepted);
        }

        debug!(
            budget,
            used = packer.used,
            messages = recent.len(),
            conversations,
            preferences,
            exhausted = packer.exhausted,
            "Context assembled"
        );

        AssembledContext {
            text: packer.sections.join("\n\n"),
            estimated_tokens: packer.used,
            messages: recent.len(),
            conversations,
            preferences,
            exhausted: packer.exhausted,
        }
    }

    async fn retrieve(&self, query: &str, limit: usize, kind: RecordKind) -> Vec<ScoredRecord> {
        if limit == 0 {
            return Vec::new();
        }
        match self.store.query(query, limit, Some(kind)).await {
            Ok(records) => records,
            Err(e) => {
                warn!(store = %self.store.name(), kind = %kind, error = %e, "Context retrieval failed, skipping stage");
                Vec::new()
            }
        }
    }
}

fn bodies(records: &[ScoredRecord], max_chars: usize) -> Vec<String> {
    records
        .iter()
        .map(|r| truncate_chars(&r.record.body, max_chars).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradwise_core::memory::Metadata;
    use gradwise_memory::LocalStore;

    fn words(n: usize) -> String {
        vec!["essay"; n].join(" ")
    }

    async fn seeded_store() -> Arc<LocalStore> {
        let store = Arc::new(LocalStore::in_memory());
        store
            .store(
                "User: when is the MIT deadline\nAssistant: December 15",
                RecordKind::Conversation,
                Metadata::new(),
            )
            .await
            .unwrap();
        store
            .store(
                "User: Stanford deadline please\nAssistant: December 1",
                RecordKind::Conversation,
                Metadata::new(),
            )
            .await
            .unwrap();
        store
            .store("Prefers funded PhD programs with a deadline in December", RecordKind::Preference, Metadata::new())
            .await
            .unwrap();
        store
    }

    fn busy_window() -> ConversationWindow {
        let mut window = ConversationWindow::new(20);
        for i in 0..5 {
            window.push_exchange(format!("question {i} about deadlines"), format!("answer {i} {}", words(10)));
        }
        window
    }

    #[tokio::test]
    async fn empty_inputs_give_empty_context() {
        let assembler = ContextAssembler::new(Arc::new(LocalStore::in_memory()));
        let ctx = assembler.build("anything", &ConversationWindow::default(), 2000).await;
        assert!(ctx.is_empty());
        assert_eq!(ctx.estimated_tokens, 0);
        assert!(!ctx.exhausted);
    }

    #[tokio::test]
    async fn all_three_stages_render_in_order() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(store);
        let mut window = ConversationWindow::default();
        window.push_exchange("Add MIT", "Created application for MIT Computer Science");

        let ctx = assembler.build("deadline", &window, 2000).await;
        assert_eq!((ctx.messages, ctx.conversations, ctx.preferences), (2, 2, 1));

        let recent = ctx.text.find(RECENT_HEADING).unwrap();
        let past = ctx.text.find(PAST_HEADING).unwrap();
        let prefs = ctx.text.find(PREFERENCES_HEADING).unwrap();
        assert!(recent < past && past < prefs);
        assert!(ctx.text.contains("User: Add MIT\nYou: Created application"));
    }

    #[tokio::test]
    async fn only_last_six_messages_truncated() {
        let assembler = ContextAssembler::new(Arc::new(LocalStore::in_memory()));
        let mut window = ConversationWindow::new(20);
        window.push(gradwise_core::message::Message::user("the very first message"));
        for i in 0..6 {
            window.push(gradwise_core::message::Message::user(format!("m{i} {}", "x".repeat(500))));
        }

        let ctx = assembler.build("q", &window, 10_000).await;
        assert_eq!(ctx.messages, 6);
        assert!(!ctx.text.contains("very first"));
        for line in ctx.text.lines().skip(1) {
            assert!(line.chars().count() <= "User: ".len() + 300);
        }
        // Oldest of the six comes first.
        assert!(ctx.text.find("m0 ").unwrap() < ctx.text.find("m5 ").unwrap());
    }

    #[tokio::test]
    async fn never_exceeds_budget_and_shrinks_monotonically() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(store);
        let window = busy_window();

        let mut previous_len = usize::MAX;
        for budget in (0..=200).rev() {
            let ctx = assembler.build("deadline", &window, budget).await;
            assert!(ctx.estimated_tokens <= budget);
            assert!(estimate_tokens(&ctx.text, DEFAULT_TOKENS_PER_WORD) <= budget);
            assert!(ctx.text.len() <= previous_len, "budget {budget} grew the context");
            previous_len = ctx.text.len();
        }
        assert!(assembler.build("deadline", &window, 0).await.is_empty());
    }

    #[tokio::test]
    async fn first_refused_item_ends_assembly() {
        let store = seeded_store().await;
        let assembler = ContextAssembler::new(store);
        let mut window = ConversationWindow::new(20);
        window.push(gradwise_core::message::Message::user(words(60)));
        window.push(gradwise_core::message::Message::assistant("ok"));

        // Heading (6) + "You: ok" (3) fits; the 60-word message does not.
        // The remaining budget would hold a short record, but stays unused.
        let ctx = assembler.build("deadline", &window, 30).await;
        assert_eq!(ctx.messages, 1);
        assert!(ctx.exhausted);
        assert_eq!(ctx.conversations, 0);
        assert_eq!(ctx.preferences, 0);
        assert_eq!(ctx.estimated_tokens, 9);
        assert_eq!(ctx.text, format!("{RECENT_HEADING}\nYou: ok"));
    }
}
