//! # Conversation sessions
//!
//! Each session keeps two parallel histories:
//!
//! - the **model history**, trimmed to a bounded window so prompts stay
//!   small, preserving up to two system messages and the first user message
//!   (the anchor) for conversational grounding;
//! - the **ui history**, unbounded, recording everything shown to the user.
//!
//! Sessions live in memory for the lifetime of the process; there is no
//! persistence or expiry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most messages the model history may hold, system messages included.
pub const MAX_HISTORY_LENGTH: usize = 10;
/// Most system messages retained when trimming.
pub const MAX_SYSTEM_MESSAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Marks assistant turns produced in report mode; the ui layer renders
    /// these differently.
    pub is_report: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_report: false,
        }
    }
}

/// A ui-history entry: the message plus when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiMessage {
    pub message: Message,
    pub at: DateTime<Utc>,
}

/// A single conversation with its dual histories.
pub struct Session {
    pub session_id: String,
    model_history: Vec<Message>,
    ui_history: Vec<UiMessage>,
}

impl Session {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            model_history: Vec::new(),
            ui_history: Vec::new(),
        }
    }

    pub fn model_history(&self) -> &[Message] {
        &self.model_history
    }

    pub fn ui_history(&self) -> &[UiMessage] {
        &self.ui_history
    }

    fn push_both(&mut self, message: Message) {
        self.ui_history.push(UiMessage {
            message: message.clone(),
            at: Utc::now(),
        });
        self.model_history.push(message);
    }

    /// Append a user turn to both histories.
    pub fn push_user(&mut self, content: &str) {
        self.push_both(Message::new(Role::User, content));
    }

    /// Append an assistant turn to both histories.
    pub fn push_assistant(&mut self, content: &str, is_report: bool) {
        self.push_both(Message {
            role: Role::Assistant,
            content: content.to_string(),
            is_report,
        });
    }

    /// Remove the most recent message from both histories if it is a user
    /// turn. Used to roll back a query whose response never completed.
    pub fn pop_last_user(&mut self) {
        if matches!(self.model_history.last(), Some(m) if m.role == Role::User) {
            self.model_history.pop();
        }
        if matches!(self.ui_history.last(), Some(m) if m.message.role == Role::User) {
            self.ui_history.pop();
        }
    }

    /// Trim the model history down to [`MAX_HISTORY_LENGTH`] messages.
    ///
    /// System messages are pulled out first and capped at
    /// [`MAX_SYSTEM_MESSAGES`] (the most recent win). Of the remaining
    /// regular messages, the first user message is kept as an anchor and the
    /// rest of the window is filled from the tail. Relative order within each
    /// group is preserved. The ui history is never trimmed.
    pub fn trim_model_history(&mut self) {
        let (mut system, regular): (Vec<Message>, Vec<Message>) = self
            .model_history
            .drain(..)
            .partition(|m| m.role == Role::System);

        if system.len() > MAX_SYSTEM_MESSAGES {
            system.drain(..system.len() - MAX_SYSTEM_MESSAGES);
        }
        let max_regular = MAX_HISTORY_LENGTH - system.len();

        let kept_regular: Vec<Message> = if regular.len() <= max_regular {
            regular
        } else if max_regular == 0 {
            Vec::new()
        } else {
            let anchor = regular.iter().find(|m| m.role == Role::User).cloned();
            match anchor {
                Some(anchor) if max_regular > 1 => {
                    let tail = &regular[regular.len() - (max_regular - 1)..];
                    if tail.contains(&anchor) {
                        regular[regular.len() - max_regular..].to_vec()
                    } else {
                        let mut kept = Vec::with_capacity(max_regular);
                        kept.push(anchor);
                        kept.extend_from_slice(tail);
                        kept
                    }
                }
                _ => regular[regular.len() - max_regular..].to_vec(),
            }
        };

        self.model_history = system;
        self.model_history.extend(kept_regular);
    }

    /// The most recent completed exchanges, excluding the in-flight user
    /// turn at the tail. Returns at most `max_pairs` question/answer pairs.
    pub fn recent_exchanges(&self, max_pairs: usize) -> &[Message] {
        if self.model_history.is_empty() {
            return &[];
        }
        let end = self.model_history.len() - 1;
        let start = end.saturating_sub(max_pairs * 2);
        &self.model_history[start..end]
    }
}

/// All live sessions, keyed by ID.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, session_id: &str) -> &mut Session {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn clear(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}
