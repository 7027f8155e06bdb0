//! Conversation state shared between the turn runtime and the web surface
//!
//! Every mutation publishes a [`ChatEvent`] so connected pages can render
//! the conversation as it grows.

use super::display::DisplayState;
use super::error::SubmitError;
use super::message::{Message, Role};
use crate::persona;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Change notification for subscribers
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessageAppended { message: Message },
    MessageUpdated { id: String, text: String },
    DisplayChanged { display: DisplayState },
    BusyChanged { busy: bool },
}

/// Point-in-time copy of the conversation
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub busy: bool,
    pub display: DisplayState,
    pub started: bool,
}

#[derive(Default)]
struct StoreState {
    messages: Vec<Message>,
    busy: bool,
    display: DisplayState,
    started: bool,
}

impl StoreState {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            messages: self.messages.clone(),
            busy: self.busy,
            display: self.display.clone(),
            started: self.started,
        }
    }
}

/// Ordered message list plus busy flag and display state
pub struct ConversationStore {
    state: Mutex<StoreState>,
    events: broadcast::Sender<ChatEvent>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ChatEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Snapshot plus a receiver positioned right after it
    pub fn subscribe(&self) -> (Snapshot, broadcast::Receiver<ChatEvent>) {
        let state = self.lock();
        let rx = self.events.subscribe();
        (state.snapshot(), rx)
    }

    /// Seed the greeting the first time the conversation is opened.
    ///
    /// Returns false if it was already started.
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        if state.started {
            return false;
        }
        state.started = true;
        let greeting = Message::bot(persona::GREETING);
        state.messages.push(greeting.clone());
        self.publish(ChatEvent::MessageAppended { message: greeting });
        true
    }

    /// Validate and record a user message, marking the store busy.
    ///
    /// Rejected submissions leave the store untouched.
    pub fn begin_turn(&self, text: &str) -> Result<Message, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        let mut state = self.lock();
        if state.busy {
            return Err(SubmitError::Busy);
        }
        let message = Message::user(text);
        state.messages.push(message.clone());
        state.busy = true;
        self.publish(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        self.publish(ChatEvent::BusyChanged { busy: true });
        Ok(message)
    }

    /// Append a complete bot message
    pub fn push_bot(&self, message: Message) {
        debug_assert_eq!(message.role, Role::Bot);
        let mut state = self.lock();
        state.messages.push(message.clone());
        self.publish(ChatEvent::MessageAppended { message });
    }

    /// Create the bot message `id` or replace its text
    pub fn upsert_bot(&self, id: &str, text: &str) {
        let mut state = self.lock();
        if let Some(existing) = state.messages.iter_mut().rev().find(|m| m.id == id) {
            if existing.text == text {
                return;
            }
            existing.text = text.to_string();
            self.publish(ChatEvent::MessageUpdated {
                id: id.to_string(),
                text: text.to_string(),
            });
        } else {
            let message = Message::new(id, Role::Bot, text);
            state.messages.push(message.clone());
            self.publish(ChatEvent::MessageAppended { message });
        }
    }

    pub fn set_display(&self, display: DisplayState) {
        let mut state = self.lock();
        state.display = display.clone();
        self.publish(ChatEvent::DisplayChanged { display });
    }

    /// Mark the current turn finished
    pub fn finish_turn(&self) {
        let mut state = self.lock();
        if state.busy {
            state.busy = false;
            self.publish(ChatEvent::BusyChanged { busy: false });
        }
    }
}

#[cfg(test)]
impl ConversationStore {
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn display(&self) -> DisplayState {
        self.lock().display.clone()
    }
}
