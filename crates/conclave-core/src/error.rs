//! Error types for conclave-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Agent definition not found in storage
    #[error("agent not found: {name}")]
    AgentNotFound {
        /// Agent name
        name: String,
    },

    /// Profile not found in storage
    #[error("profile not found: {name}")]
    ProfileNotFound {
        /// Profile name
        name: String,
    },

    /// Session not found (or unreadable, which is treated the same)
    #[error("session not found: {id}")]
    SessionNotFound {
        /// Session id
        id: String,
    },

    /// Agent is locked by another live session
    #[error("agent busy: {name} is locked by another session")]
    AgentBusy {
        /// Agent name
        name: String,
    },

    /// Storage I/O failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Persisted record failed to serialize
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Terminal write failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM endpoint error
    #[error("llm error: {0}")]
    Llm(#[from] conclave_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
