//! The per-session conversation window.

use gradwise_core::message::Message;
use std::collections::VecDeque;

/// Messages kept when no capacity is configured.
pub const DEFAULT_WINDOW_CAPACITY: usize = 20;

/// The last `capacity` messages of a session, oldest first.
///
/// Lives only in memory; the durable record of a conversation is the
/// retrieval store.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl ConversationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message, dropping the oldest ones on overflow.
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Append one user message and the reply to it.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.push(Message::user(user));
        self.push(Message::assistant(assistant));
    }

    /// The newest `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.iter().skip(self.messages.len().saturating_sub(n))
    }

    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
