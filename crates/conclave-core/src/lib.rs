//! Conclave Core - Meeting Orchestration Engine
//!
//! This crate provides the core logic for the Conclave agent CLI:
//! - Meeting: multi-agent rooms with targeting, solicitation, response
//!   buffering, and depth-bounded agent-to-agent chains
//! - Render: speaker-aware streaming colorizer for the terminal
//! - Storage: JSON-file persistence for agents, profiles, and sessions
//! - Lock: fail-fast per-agent mutex with stale-lock self-healing
//! - Prompt: system prompt assembly from agent and profile attributes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod lock;
pub mod meeting;
pub mod profile;
pub mod prompt;
pub mod render;
pub mod storage;

pub use agent::{Agent, ModelParams};
pub use chat::{ChatMessage, ChatSession};
pub use config::Config;
pub use error::{Error, Result};
pub use lock::{LockGuard, LockManager};
pub use meeting::{
    BufferedResponse, MeetingMessage, MeetingMetadata, MeetingSession, Role, TargetedMessage,
    TurnDriver, TurnOutcome,
};
pub use profile::Profile;
pub use prompt::build_system_prompt;
pub use render::{ColorAssigner, SpeakerRenderer, AGENT_PALETTE, USER_COLOR};
pub use storage::{ArchivedSession, Storage};
