use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{ChatCompletionRequest, ChatCompletionResponse, LlmClient, UsageMetrics};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Chat model settings. Answers are grounded in retrieved text, so sampling
/// defaults to temperature 0.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl OpenAiClientConfig {
    /// OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_MODEL, OPENAI_TEMPERATURE,
    /// OPENAI_TOP_P, OPENAI_MAX_TOKENS, OPENAI_TIMEOUT_SECS. Unparsable values
    /// keep the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(d.base_url),
            model: std::env::var("OPENAI_MODEL").unwrap_or(d.model),
            temperature: env_parse("OPENAI_TEMPERATURE").unwrap_or(d.temperature),
            top_p: env_parse("OPENAI_TOP_P").unwrap_or(d.top_p),
            max_tokens: env_parse("OPENAI_MAX_TOKENS").or(d.max_tokens),
            timeout: env_parse("OPENAI_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(d.timeout),
        }
    }
}

/// `/chat/completions` on OpenAI or any compatible server.
#[derive(Clone)]
pub struct OpenAiClient {
    http: HttpClient,
    cfg: OpenAiClientConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiClientConfig) -> Result<Self, OpenAiError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(OpenAiError::from_reqwest)?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'))
    }

    // Per-request settings win over the configured ones.
    fn wire_request<'a>(&'a self, req: &'a ChatCompletionRequest) -> wire::Request<'a> {
        wire::Request {
            model: req.model.as_deref().unwrap_or(&self.cfg.model),
            temperature: req.temperature.unwrap_or(self.cfg.temperature),
            top_p: req.top_p.unwrap_or(self.cfg.top_p),
            max_tokens: req.max_tokens.or(self.cfg.max_tokens),
            messages: &req.messages,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, OpenAiError> {
        if request.messages.is_empty() {
            return Err(OpenAiError::EmptyMessages);
        }
        let api_key = self.cfg.api_key.as_deref().ok_or(OpenAiError::MissingApiKey)?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.wire_request(&request))
            .send()
            .await
            .map_err(OpenAiError::from_reqwest)?;

        let status = response.status();
        let body = response.bytes().await.map_err(OpenAiError::from_reqwest)?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        decode_completion(&body)
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> OpenAiError {
    let error = serde_json::from_slice::<wire::ErrorEnvelope>(body)
        .map(|env| env.error)
        .unwrap_or_else(|_| ApiErrorBody {
            message: String::from_utf8_lossy(body).trim().chars().take(200).collect(),
            ..ApiErrorBody::default()
        });
    OpenAiError::Api { status, error }
}

// The first choice carrying text is the answer; `raw` keeps the full body.
fn decode_completion(body: &[u8]) -> Result<ChatCompletionResponse, OpenAiError> {
    let raw: Value = serde_json::from_slice(body).map_err(OpenAiError::Decode)?;
    let parsed: wire::Response = serde_json::from_value(raw.clone()).map_err(OpenAiError::Decode)?;
    let choice = parsed.choices.into_iter().find(|c| c.message.content.is_some());
    let (content, finish_reason) = match choice {
        Some(c) => (c.message.content.unwrap_or_default(), c.finish_reason),
        None => (String::new(), None),
    };
    Ok(ChatCompletionResponse {
        content,
        finish_reason,
        usage: parsed.usage.map(|u| UsageMetrics {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        raw,
    })
}

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("chat completion requires at least one message")]
    EmptyMessages,
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {}", .error.message)]
    Api { status: StatusCode, error: ApiErrorBody },
    #[error("could not decode completion: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("mock client response queue is empty")]
    #[cfg_attr(not(test), allow(dead_code))]
    MockQueueEmpty,
}

impl OpenAiError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { OpenAiError::Timeout } else { OpenAiError::Http(err) }
    }

    /// Transient failures worth one more attempt: timeouts, transport errors,
    /// rate limiting and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            OpenAiError::Timeout | OpenAiError::Http(_) => true,
            OpenAiError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            OpenAiError::MissingApiKey
            | OpenAiError::EmptyMessages
            | OpenAiError::Decode(_)
            | OpenAiError::MockQueueEmpty => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl Default for ApiErrorBody {
    fn default() -> Self {
        Self { message: "unknown error".to_string(), kind: None, code: None }
    }
}

mod wire {
    use serde::{Deserialize, Serialize};

    use super::ApiErrorBody;
    use crate::llm::ChatMessage;

    #[derive(Debug, Serialize)]
    pub struct Request<'a> {
        pub model: &'a str,
        pub temperature: f32,
        pub top_p: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_tokens: Option<u32>,
        pub messages: &'a [ChatMessage],
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub choices: Vec<Choice>,
        pub usage: Option<Usage>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Choice {
        pub message: ReplyMessage,
        #[serde(default)]
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ReplyMessage {
        #[serde(default)]
        pub content: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Usage {
        pub prompt_tokens: Option<u32>,
        pub completion_tokens: Option<u32>,
        pub total_tokens: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorEnvelope {
        pub error: ApiErrorBody,
    }
}
