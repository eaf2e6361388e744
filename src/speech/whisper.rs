use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{api_error, SpeechError, Transcriber};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct WhisperConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl WhisperConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(model) = std::env::var("OPENAI_TRANSCRIBE_MODEL") {
            cfg.model = model;
        }
        cfg
    }
}

/// Hosted Whisper through `/audio/transcriptions`.
#[derive(Clone)]
pub struct WhisperTranscriber {
    http: HttpClient,
    cfg: WhisperConfig,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(cfg: WhisperConfig) -> Result<Self, SpeechError> {
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::EmptyInput);
        }
        let api_key = self.cfg.api_key.as_deref().ok_or(SpeechError::MissingApiKey("OPENAI_API_KEY"))?;

        let part = Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let form = Form::new().text("model", self.cfg.model.clone()).part("file", part);
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcriber(api_key: Option<&str>) -> WhisperTranscriber {
        WhisperTranscriber::new(WhisperConfig {
            api_key: api_key.map(str::to_string),
            base_url: "http://localhost:9/v1/".into(),
            ..WhisperConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn endpoint_and_default_model() {
        let t = transcriber(Some("k"));
        assert_eq!(t.endpoint(), "http://localhost:9/v1/audio/transcriptions");
        assert_eq!(WhisperConfig::default().model, "whisper-1");
    }

    #[tokio::test]
    async fn empty_audio_and_missing_key_fail_locally() {
        let err = transcriber(Some("k")).transcribe(Bytes::new(), "a.wav").await.unwrap_err();
        assert!(matches!(err, SpeechError::EmptyInput));

        let err = transcriber(None).transcribe(Bytes::from_static(b"RIFF"), "a.wav").await.unwrap_err();
        assert!(matches!(err, SpeechError::MissingApiKey("OPENAI_API_KEY")));
    }
}
