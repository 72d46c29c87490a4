//! SSE streaming parser for chat completions
//!
//! Converts a raw `reqwest` byte stream into [`StreamChunk`] values.
//! Handles `data: [DONE]`, partial lines, and buffering: a delta may arrive
//! split across TCP reads, so lines are only parsed once a `\n` lands.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::completion::TokenUsage;
use crate::error::Error;

/// A single delta from a streaming chat completion.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// The text delta for this chunk (may be empty on the final chunk)
    pub delta: String,
    /// Finish reason, present on the terminating chunk
    pub finish_reason: Option<String>,
    /// Usage totals, when the server includes them in the last chunk
    pub usage: Option<TokenUsage>,
    /// Whether the stream signalled `[DONE]`
    pub done: bool,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChunkRaw {
    choices: Vec<StreamChoiceRaw>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChoiceRaw {
    #[serde(default)]
    delta: DeltaRaw,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

/// Stream adapter turning raw SSE bytes into [`StreamChunk`] values.
pub struct ChatStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    finished: bool,
}

impl ChatStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            finished: false,
        }
    }
}

impl Stream for ChatStream {
    type Item = crate::error::Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            if let Some(result) = try_parse_line(&mut this.buffer) {
                if let Ok(chunk) = &result {
                    if chunk.done {
                        this.finished = true;
                    }
                }
                return Poll::Ready(Some(result));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => this.buffer.push_str(text),
                    Err(e) => {
                        return Poll::Ready(Some(Err(Error::InvalidResponse(format!(
                            "invalid utf-8 in stream: {e}"
                        )))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(Error::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // Trailing data without a newline is not a complete event
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extract and parse one complete SSE line from the buffer.
/// Returns `None` until a full line is available.
fn try_parse_line(buffer: &mut String) -> Option<crate::error::Result<StreamChunk>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // Blank lines are SSE event separators
        if line.is_empty() {
            continue;
        }

        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(Ok(StreamChunk {
                delta: String::new(),
                finish_reason: None,
                usage: None,
                done: true,
            }));
        }

        match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => {
                let usage = raw.usage;
                let (delta, finish_reason) = raw
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| (c.delta.content.unwrap_or_default(), c.finish_reason))
                    .unwrap_or_default();

                return Some(Ok(StreamChunk {
                    delta,
                    finish_reason,
                    usage,
                    done: false,
                }));
            }
            // Skip malformed events rather than killing the stream
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(parts: Vec<&'static str>) -> impl Stream<Item = reqwest::Result<Bytes>> {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    #[tokio::test]
    async fn test_parses_deltas_and_done() {
        let stream = ChatStream::new(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        ]));

        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta, "Hel");
        assert_eq!(chunks[1].delta, "lo");
        assert!(chunks[2].done);
    }

    #[tokio::test]
    async fn test_delta_split_across_reads() {
        let stream = ChatStream::new(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"co",
            "ntent\":\"token\"},\"finish_reason\":null}]}\n",
            "data: [DONE]\n",
        ]));

        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks[0].delta, "token");
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn test_skips_malformed_events() {
        let stream = ChatStream::new(byte_stream(vec![
            "data: {not json}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"},\"finish_reason\":\"stop\"}]}\n",
            "data: [DONE]\n",
        ]));

        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta, "ok");
        assert_eq!(chunks[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_nothing_after_done() {
        let stream = ChatStream::new(byte_stream(vec![
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"},\"finish_reason\":null}]}\n",
        ]));

        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].done);
    }
}
