//! Meeting session state
//!
//! The durable record for one room: the shared conversation log, the queue
//! of buffered ("raised hand") responses, and the chain settings.
//!
//! `shared_messages` is append-only. Entries are never edited in place;
//! clearing or restoring replaces the whole array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default bound on agent-to-agent chain depth
pub const DEFAULT_MAX_CHAIN_LENGTH: u32 = 5;

/// Default advisory token budget before agents should check in
pub const DEFAULT_CHECK_IN_TOKEN_LIMIT: u32 = 512;

/// Who produced a meeting message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human user (or a relayed message at chain depth > 0)
    User,
    /// An agent
    Assistant,
}

/// One turn in the shared log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMessage {
    /// Message role
    pub role: Role,
    /// Raw text (assistant turns may contain `[name]:` sub-segments)
    pub content: String,
    /// Responding agent (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Comma-joined explicit targets (user turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent: Option<String>,
    /// 0 for user-originated turns, N for the Nth agent-to-agent hop
    #[serde(default)]
    pub chain_depth: u32,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl MeetingMessage {
    /// A user-originated (or relayed) turn
    #[must_use]
    pub fn user(content: impl Into<String>, targets: &[String], chain_depth: u32) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            agent_name: None,
            target_agent: if targets.is_empty() {
                None
            } else {
                Some(targets.join(", "))
            },
            chain_depth,
            timestamp: Utc::now(),
        }
    }

    /// An agent's turn
    #[must_use]
    pub fn assistant(
        agent_name: impl Into<String>,
        content: impl Into<String>,
        chain_depth: u32,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            agent_name: Some(agent_name.into()),
            target_agent: None,
            chain_depth,
            timestamp: Utc::now(),
        }
    }
}

/// An agent's reply that was generated but not streamed live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedResponse {
    /// Agent that raised its hand
    pub agent_name: String,
    /// The generated reply
    pub content: String,
    /// When the reply was generated
    pub timestamp: DateTime<Utc>,
}

/// Denormalized summary fields, recomputed on every mutation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMetadata {
    /// Current participants
    pub active_agents: Vec<String>,
    /// Length of the shared log
    pub total_messages: usize,
}

fn default_max_chain_length() -> u32 {
    DEFAULT_MAX_CHAIN_LENGTH
}

fn default_check_in_token_limit() -> u32 {
    DEFAULT_CHECK_IN_TOKEN_LIMIT
}

/// Durable state for one meeting room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSession {
    /// Stable id, derived as `room-<room_name>`
    pub id: String,
    /// User-facing room name
    pub room_name: String,
    /// Participants in display order
    pub agent_names: Vec<String>,
    /// Profile active for this room
    pub profile_name: String,
    /// The canonical conversation log (append-only)
    pub shared_messages: Vec<MeetingMessage>,
    /// Raised hands awaiting `/respond`
    pub buffered_responses: Vec<BufferedResponse>,
    /// Bound on agent-to-agent chain depth; 0 disables chaining.
    /// Defaulted on resume so rooms persisted by older builds stay loadable.
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: u32,
    /// Advisory token budget before agents should check in with the user
    #[serde(default = "default_check_in_token_limit")]
    pub check_in_token_limit: u32,
    /// Denormalized summary
    pub metadata: MeetingMetadata,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl MeetingSession {
    /// Derive the storage id for a room name
    #[must_use]
    pub fn id_for_room(room_name: &str) -> String {
        format!("room-{room_name}")
    }

    /// Create a fresh room
    #[must_use]
    pub fn new(
        room_name: impl Into<String>,
        agent_names: Vec<String>,
        profile_name: impl Into<String>,
    ) -> Self {
        let room_name = room_name.into();
        let now = Utc::now();
        Self {
            id: Self::id_for_room(&room_name),
            room_name,
            metadata: MeetingMetadata {
                active_agents: agent_names.clone(),
                total_messages: 0,
            },
            agent_names,
            profile_name: profile_name.into(),
            shared_messages: Vec::new(),
            buffered_responses: Vec::new(),
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            check_in_token_limit: DEFAULT_CHECK_IN_TOKEN_LIMIT,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and refresh the summary fields
    pub fn push_message(&mut self, message: MeetingMessage) {
        self.shared_messages.push(message);
        self.touch();
    }

    /// Remove and return the most recent message (cancellation retraction)
    pub fn retract_last_message(&mut self) -> Option<MeetingMessage> {
        let message = self.shared_messages.pop();
        self.touch();
        message
    }

    /// Buffer a response from an agent that was not the live speaker
    pub fn buffer_response(&mut self, agent_name: impl Into<String>, content: impl Into<String>) {
        self.buffered_responses.push(BufferedResponse {
            agent_name: agent_name.into(),
            content: content.into(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    /// Consume the buffered response for an agent, moving it into the
    /// shared log with its original timestamp. Returns the entry, or `None`
    /// when the agent has no raised hand.
    pub fn consume_buffered(&mut self, agent_name: &str) -> Option<BufferedResponse> {
        let index = self
            .buffered_responses
            .iter()
            .position(|r| r.agent_name.eq_ignore_ascii_case(agent_name))?;
        let buffered = self.buffered_responses.remove(index);

        self.shared_messages.push(MeetingMessage {
            role: Role::Assistant,
            content: buffered.content.clone(),
            agent_name: Some(buffered.agent_name.clone()),
            target_agent: None,
            chain_depth: 0,
            timestamp: buffered.timestamp,
        });
        self.touch();
        Some(buffered)
    }

    /// Discard all buffered responses, returning how many were dropped
    pub fn clear_buffered(&mut self) -> usize {
        let count = self.buffered_responses.len();
        if count > 0 {
            self.buffered_responses.clear();
            self.touch();
        }
        count
    }

    /// Add a participant (no-op if already present)
    pub fn add_agent(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.has_agent(&name) {
            self.agent_names.push(name);
            self.touch();
        }
    }

    /// Remove a participant and any raised hand they held.
    /// Returns the stored name, or `None` when not present.
    pub fn remove_agent(&mut self, name: &str) -> Option<String> {
        let index = self
            .agent_names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))?;
        let removed = self.agent_names.remove(index);
        self.buffered_responses
            .retain(|r| !r.agent_name.eq_ignore_ascii_case(&removed));
        self.touch();
        Some(removed)
    }

    /// Whether an agent participates in the room (case-insensitive)
    #[must_use]
    pub fn has_agent(&self, name: &str) -> bool {
        self.agent_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Replace the log and buffers from an archived copy
    pub fn restore_from(&mut self, other: &MeetingSession) {
        self.shared_messages = other.shared_messages.clone();
        self.buffered_responses = other.buffered_responses.clone();
        self.touch();
    }

    /// Clear the log and buffers
    pub fn reset(&mut self) {
        self.shared_messages.clear();
        self.buffered_responses.clear();
        self.touch();
    }

    /// Recompute summary fields and bump `updated_at`
    pub fn touch(&mut self) {
        self.metadata.active_agents = self.agent_names.clone();
        self.metadata.total_messages = self.shared_messages.len();
        self.updated_at = Utc::now();
    }
}
