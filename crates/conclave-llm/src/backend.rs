//! Chat backend trait
//!
//! Seam between the meeting engine and the model-serving endpoint, so
//! orchestration logic can be exercised against scripted fakes in tests.

use futures::stream::BoxStream;

use crate::completion::{ChatRequest, ChatResponse};
use crate::error::Result;
use crate::streaming::StreamChunk;

/// Trait for anything that can serve chat completions
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Single-shot completion
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streamed completion; dropping the stream cancels the request
    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>>;
}
