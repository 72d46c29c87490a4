//! HTTP client for the local model-serving endpoint
//!
//! Speaks the OpenAI-compatible `/v1/chat/completions` surface exposed by
//! local model runners. Supports single-shot and SSE-streamed completions.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::backend::ChatBackend;
use crate::completion::{ChatRequest, ChatResponse, Message};
use crate::error::{Error, Result};
use crate::streaming::{ChatStream, StreamChunk};

/// Default endpoint of the local model runner
pub const DEFAULT_BASE_URL: &str = "http://localhost:12434";

/// Completions path on the local runner
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL (default: http://localhost:12434)
    pub base_url: String,
    /// Request timeout (generous for local inference)
    pub timeout: Duration,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ChatClientConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONCLAVE_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Chat client against a local model-serving endpoint
pub struct ChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl ChatClient {
    /// Create a new client
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create a client for a base URL with default settings
    pub fn for_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::new(ChatClientConfig::default().with_base_url(base_url))
    }

    /// The configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn completions_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        )
    }

    /// Single-shot chat completion
    pub async fn chat(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        request.stream = false;
        debug!(model = %request.model, messages = request.messages.len(), "chat completion");

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("HTTP {status}: {body}")));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    /// Streamed chat completion
    ///
    /// Dropping the returned stream aborts the in-flight request, which is
    /// how callers implement cancellation.
    pub async fn chat_stream(&self, mut request: ChatRequest) -> Result<ChatStream> {
        request.stream = true;
        debug!(model = %request.model, messages = request.messages.len(), "streamed chat completion");

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("HTTP {status}: {body}")));
        }

        Ok(ChatStream::new(response.bytes_stream()))
    }

    /// Check whether the endpoint answers at all
    ///
    /// Any HTTP response (even an error status) means the runner is up;
    /// only a connection failure counts as down.
    pub async fn health_check(&self) -> bool {
        let probe = ChatRequest::new("test")
            .with_message(Message::user("ping"))
            .with_max_tokens(1);

        let result = self
            .client
            .post(self.completions_url())
            .timeout(Duration::from_secs(2))
            .json(&probe)
            .send()
            .await;

        result.is_ok()
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        ChatClient::chat(self, request).await
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<futures::stream::BoxStream<'static, Result<StreamChunk>>> {
        use futures::StreamExt;
        let stream = ChatClient::chat_stream(self, request).await?;
        Ok(stream.boxed())
    }
}
