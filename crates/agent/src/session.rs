//! Sessions and the turn API.
//!
//! A [`SessionRegistry`] owns every session's window and shares one
//! [`Orchestrator`]. Turns on the same session are serialized by that
//! session's async mutex, held for the whole turn; different sessions run
//! concurrently.

use crate::orchestrator::Orchestrator;
use crate::window::{ConversationWindow, DEFAULT_WINDOW_CAPACITY};
use chrono::{DateTime, Utc};
use gradwise_core::error::MemoryError;
use gradwise_core::memory::{Metadata, RecordKind};
use gradwise_core::turn::TurnReply;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// One conversation's in-memory state.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub window: ConversationWindow,
    pub turns: u64,
    pub created_at: DateTime<Utc>,
    ended: bool,
}

impl Session {
    fn new(id: &str, capacity: usize) -> Self {
        Self {
            id: id.to_string(),
            window: ConversationWindow::new(capacity),
            turns: 0,
            created_at: Utc::now(),
            ended: false,
        }
    }
}

pub struct SessionRegistry {
    orchestrator: Arc<Orchestrator>,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    window_capacity: usize,
}

impl SessionRegistry {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: RwLock::new(HashMap::new()),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }

    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run one turn for `session_id`, creating the session on first use.
    pub async fn process_turn(&self, message: &str, session_id: &str) -> TurnReply {
        loop {
            let handle = self.session(session_id).await;
            let mut session = handle.lock().await;
            if session.ended {
                // Ended while this turn waited; run on its replacement.
                continue;
            }
            let reply = self
                .orchestrator
                .run_turn(session_id, message, &mut session.window)
                .await;
            session.turns += 1;
            return reply;
        }
    }

    /// Store a standing preference for later context assembly.
    pub async fn remember_preference(
        &self,
        session_id: &str,
        text: &str,
        category: &str,
    ) -> Result<String, MemoryError> {
        let mut metadata = Metadata::new();
        metadata.insert("session_id".into(), session_id.to_string());
        metadata.insert("category".into(), category.to_string());
        let id = self
            .orchestrator
            .store()
            .store(text, RecordKind::Preference, metadata)
            .await?;
        debug!(session_id = %session_id, record_id = %id, category = %category, "Preference stored");
        Ok(id)
    }

    /// Turns completed on `session_id`, if the session exists.
    pub async fn turn_count(&self, session_id: &str) -> Option<u64> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        let turns = session.lock().await.turns;
        Some(turns)
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop a session's window once its in-flight turn, if any, finishes.
    /// Stored records are kept.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let Some(handle) = self.sessions.read().await.get(session_id).cloned() else {
            return false;
        };
        let mut session = handle.lock().await;
        if session.ended {
            return false;
        }
        session.ended = true;

        let mut sessions = self.sessions.write().await;
        if sessions.get(session_id).is_some_and(|current| Arc::ptr_eq(current, &handle)) {
            sessions.remove(session_id);
        }
        debug!(session_id = %session_id, turns = session.turns, "Session ended");
        true
    }

    async fn session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(session_id, self.window_capacity))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CompletionBackend;
    use crate::test_helpers::ScriptedProvider;
    use gradwise_core::memory::RetrievalStore;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use gradwise_core::state::NoopState;
    use gradwise_memory::LocalStore;
    use gradwise_tools::{RecordBook, default_registry};

    fn registry(store: Arc<LocalStore>) -> SessionRegistry {
        let tools = Arc::new(default_registry(Arc::new(RecordBook::in_memory())));
        let orchestrator = Orchestrator::new(store, Arc::new(NoopState), tools, None);
        SessionRegistry::new(Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn sessions_keep_separate_windows() {
        let store = Arc::new(LocalStore::in_memory());
        let sessions = registry(store.clone());

        sessions.process_turn("hello", "a").await;
        sessions.process_turn("hello again", "a").await;
        sessions.process_turn("hi", "b").await;

        assert_eq!(sessions.turn_count("a").await, Some(2));
        assert_eq!(sessions.turn_count("b").await, Some(1));
        assert_eq!(sessions.turn_count("c").await, None);
        assert_eq!(sessions.session_ids().await, vec!["a", "b"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_are_serialized() {
        let store = Arc::new(LocalStore::in_memory());
        let sessions = Arc::new(registry(store.clone()).with_window_capacity(40));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sessions = sessions.clone();
                tokio::spawn(async move { sessions.process_turn(&format!("message {i}"), "shared").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sessions.turn_count("shared").await, Some(8));
        let session = sessions.session("shared").await;
        let session = session.lock().await;
        assert_eq!(session.window.len(), 16);
        // Exchanges never interleave: every user message is followed by its reply.
        let messages: Vec<_> = session.window.messages().collect();
        for pair in messages.chunks(2) {
            let user = &pair[0].content;
            assert!(pair[1].content.contains(user.as_str()));
        }
    }

    #[tokio::test]
    async fn preference_feeds_later_context() {
        let store = Arc::new(LocalStore::in_memory());
        let sessions = registry(store.clone());
        sessions
            .remember_preference("a", "Prefers programs with funded PhD positions", "funding")
            .await
            .unwrap();

        let prefs = store.recent(RecordKind::Preference, 5).await.unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].metadata["category"], "funding");

        let reply = sessions.process_turn("any funded programs?", "a").await;
        assert!(reply.trace[0].note.contains("1 preferences"));
    }

    #[tokio::test]
    async fn ending_a_session_keeps_records() {
        let store = Arc::new(LocalStore::in_memory());
        let sessions = registry(store.clone());
        sessions.process_turn("hello", "a").await;
        assert!(sessions.end_session("a").await);
        assert!(!sessions.end_session("a").await);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_waits_for_the_turn_in_flight() {
        let provider = Arc::new(ScriptedProvider::failing().with_delay(Duration::from_secs(1)));
        let tools = Arc::new(default_registry(Arc::new(RecordBook::in_memory())));
        let orchestrator = Orchestrator::new(
            Arc::new(LocalStore::in_memory()),
            Arc::new(NoopState),
            tools,
            Some(CompletionBackend::new(provider, "gpt-4o")),
        );
        let sessions = Arc::new(SessionRegistry::new(Arc::new(orchestrator)));
        let order = Arc::new(StdMutex::new(Vec::new()));

        let first = {
            let (sessions, order) = (sessions.clone(), order.clone());
            tokio::spawn(async move {
                sessions.process_turn("first", "a").await;
                order.lock().unwrap().push("first turn");
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let end = {
            let (sessions, order) = (sessions.clone(), order.clone());
            tokio::spawn(async move {
                let ended = sessions.end_session("a").await;
                order.lock().unwrap().push("ended");
                ended
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = {
            let (sessions, order) = (sessions.clone(), order.clone());
            tokio::spawn(async move {
                sessions.process_turn("second", "a").await;
                order.lock().unwrap().push("second turn");
            })
        };

        first.await.unwrap();
        assert!(end.await.unwrap());
        second.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first turn", "ended", "second turn"]);
        // The second turn ran on a fresh session, not the ended one.
        assert_eq!(sessions.turn_count("a").await, Some(1));
        let session = sessions.session("a").await;
        let session = session.lock().await;
        assert_eq!(session.window.len(), 2);
        assert_eq!(session.window.messages().next().map(|m| m.content.as_str()), Some("second"));
    }
}
