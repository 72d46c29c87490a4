//! Single-agent chat sessions
//!
//! The plain one-agent conversation record used by `run` mode and by the
//! `/agent` switch out of a meeting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meeting::session::Role;

/// One turn in a single-agent chat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message role
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message with the current timestamp
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A single-agent conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Stable id, derived as `chat-<agent>`
    pub id: String,
    /// The agent this chat drives
    pub agent_name: String,
    /// Conversation log
    pub messages: Vec<ChatMessage>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Derive the storage id for an agent's chat
    #[must_use]
    pub fn id_for_agent(agent_name: &str) -> String {
        format!("chat-{agent_name}")
    }

    /// Create an empty chat for an agent
    #[must_use]
    pub fn new(agent_name: impl Into<String>) -> Self {
        let agent_name = agent_name.into();
        let now = Utc::now();
        Self {
            id: Self::id_for_agent(&agent_name),
            agent_name,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
        self.updated_at = Utc::now();
    }
}
