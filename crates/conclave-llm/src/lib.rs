//! Conclave LLM - local model endpoint client
//!
//! This crate provides the HTTP client the Conclave CLI uses to talk to a
//! local OpenAI-compatible model runner:
//! - Completion: request/response wire types
//! - Streaming: SSE delta parsing with partial-line buffering
//! - Client: single-shot and streamed `/v1/chat/completions` calls
//! - Backend: trait seam for testing orchestration without a server

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod client;
pub mod completion;
pub mod error;
pub mod streaming;

pub use backend::ChatBackend;
pub use client::{ChatClient, ChatClientConfig, DEFAULT_BASE_URL};
pub use completion::{ChatChoice, ChatRequest, ChatResponse, Message, MessageRole, TokenUsage};
pub use error::{Error, Result};
pub use streaming::{ChatStream, StreamChunk};
