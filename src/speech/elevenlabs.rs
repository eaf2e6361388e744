use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client as HttpClient;
use serde::Serialize;

use super::{api_error, SpeechError, Synthesizer};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
// "Rachel"
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL: &str = "eleven_monolingual_v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ElevenLabsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout: Duration,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ELEVEN_LABS_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ElevenLabsConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("ELEVEN_LABS_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(voice) = std::env::var("ELEVEN_LABS_VOICE_ID") {
            cfg.voice_id = voice;
        }
        cfg
    }
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Clone)]
pub struct ElevenLabsSynthesizer {
    http: HttpClient,
    cfg: ElevenLabsConfig,
}

impl ElevenLabsSynthesizer {
    pub fn new(cfg: ElevenLabsConfig) -> Result<Self, SpeechError> {
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self { http, cfg })
    }

    fn api_key(&self) -> Result<&str, SpeechError> {
        self.cfg.api_key.as_deref().ok_or(SpeechError::MissingApiKey("ELEVEN_LABS_API_KEY"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            model_id: &self.cfg.model_id,
            voice_settings: VoiceSettings {
                stability: self.cfg.stability,
                similarity_boost: self.cfg.similarity_boost,
            },
        }
    }

    /// Cheap authenticated call (`GET /voices`) to fail fast on a bad key.
    pub async fn validate_key(&self) -> Result<(), SpeechError> {
        let response = self
            .http
            .get(self.url("voices"))
            .header("xi-api-key", self.api_key()?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyInput);
        }
        let response = self
            .http
            .post(self.url(&format!("text-to-speech/{}", self.cfg.voice_id)))
            .header("xi-api-key", self.api_key()?)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&self.request_body(text))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.bytes().await?)
    }
}
