//! Scripted chat backend for protocol tests.
//!
//! Replies are keyed by the request's model id (each test agent gets a
//! distinct model), queued in order; the last reply repeats once the queue
//! is down to one entry.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use futures::stream::BoxStream;
use futures::StreamExt;

use conclave_llm::{
    ChatBackend, ChatChoice, ChatRequest, ChatResponse, Error, Message, Result, StreamChunk,
};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Failure(String),
}

/// Fake [`ChatBackend`] with per-model scripted replies
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    chat_calls: Mutex<Vec<String>>,
    stream_calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, model: &str, content: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Scripted::Reply(content.to_string()));
        self
    }

    pub fn with_failure(self, model: &str, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Scripted::Failure(message.to_string()));
        self
    }

    /// Models hit by non-streaming calls, in order
    pub fn chat_calls(&self) -> Vec<String> {
        self.chat_calls.lock().unwrap().clone()
    }

    /// Models hit by streaming calls, in order
    pub fn stream_calls(&self) -> Vec<String> {
        self.stream_calls.lock().unwrap().clone()
    }

    fn next_script(&self, model: &str) -> Scripted {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(model) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue.front().unwrap().clone(),
            _ => Scripted::Failure(format!("no script for model {model}")),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.chat_calls.lock().unwrap().push(request.model.clone());
        match self.next_script(&request.model) {
            Scripted::Reply(content) => Ok(ChatResponse {
                choices: vec![ChatChoice {
                    message: Message::assistant(content),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }),
            Scripted::Failure(message) => Err(Error::Api(message)),
        }
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        self.stream_calls
            .lock()
            .unwrap()
            .push(request.model.clone());
        match self.next_script(&request.model) {
            Scripted::Reply(content) => {
                // Split into small fragments so renderers see a real stream
                let mut chunks: Vec<Result<StreamChunk>> = content
                    .chars()
                    .collect::<Vec<_>>()
                    .chunks(4)
                    .map(|c| {
                        Ok(StreamChunk {
                            delta: c.iter().collect(),
                            finish_reason: None,
                            usage: None,
                            done: false,
                        })
                    })
                    .collect();
                chunks.push(Ok(StreamChunk {
                    delta: String::new(),
                    finish_reason: Some("stop".to_string()),
                    usage: None,
                    done: true,
                }));
                Ok(futures::stream::iter(chunks).boxed())
            }
            Scripted::Failure(message) => Err(Error::Api(message)),
        }
    }
}
