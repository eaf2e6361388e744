pub mod openai;

#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

pub use openai::{OpenAiClient, OpenAiClientConfig, OpenAiError};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl ChatCompletionRequest {
    /// Request with every sampling knob left to the client defaults.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { model: None, messages, max_tokens: None, temperature: None, top_p: None }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self { Self::new(ChatRole::System, content) }

    pub fn user(content: impl Into<String>) -> Self { Self::new(ChatRole::User, content) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionResponse {
    pub content: String,
    /// `length` means the answer was cut off by the token limit.
    pub finish_reason: Option<String>,
    pub raw: Value,
    pub usage: Option<UsageMetrics>,
}

impl ChatCompletionResponse {
    #[cfg(test)]
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), finish_reason: Some("stop".into()), raw: Value::Null, usage: None }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct UsageMetrics {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Queue-backed client for tests: replies in push order and records requests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<ChatCompletionResponse, OpenAiError>>>,
    calls: Mutex<Vec<ChatCompletionRequest>>,
}

#[cfg(test)]
impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, resp: Result<ChatCompletionResponse, OpenAiError>) {
        if let Ok(mut q) = self.responses.lock() { q.push_back(resp); }
    }

    pub fn calls(&self) -> Vec<ChatCompletionRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for MockClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, OpenAiError> {
        if let Ok(mut calls) = self.calls.lock() { calls.push(request); }
        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Err(OpenAiError::MockQueueEmpty))
    }
}
