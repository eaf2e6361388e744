pub mod elevenlabs;
pub mod whisper;

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use clap::Args;
use serde::Serialize;
use thiserror::Error;

use crate::telemetry;
use crate::telemetry::ops::speech::Phase;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsSynthesizer};
pub use whisper::{WhisperConfig, WhisperTranscriber};

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("input is empty")]
    EmptyInput,
    #[error("{0} is not set")]
    MissingApiKey(&'static str),
    #[error("unauthorized: check the API key")]
    Unauthorized,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {status}: {message}")]
    Api { status: reqwest::StatusCode, message: String },
}

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<String, SpeechError>;
}

/// Text to speech; returns encoded audio (mp3).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}

pub(crate) async fn api_error(response: reqwest::Response) -> SpeechError {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return SpeechError::Unauthorized;
    }
    let message = response.text().await.unwrap_or_default();
    SpeechError::Api { status, message }
}

#[derive(Args)]
pub struct TranscribeCmd {
    /// Audio file (wav, mp3, m4a, webm)
    file: PathBuf,
}

#[derive(Serialize)]
struct TranscribeResult {
    file: String,
    text: String,
}

pub async fn run_transcribe(args: TranscribeCmd) -> Result<()> {
    let log = telemetry::transcribe();
    let _g = log.root_span_kv([("file", args.file.display().to_string())]).entered();

    let _s = log.span(&Phase::Read).entered();
    let audio = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    drop(_s);

    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());

    let transcriber = WhisperTranscriber::new(WhisperConfig::from_env()).context("init transcriber")?;
    let _s = log.span(&Phase::Request).entered();
    let text = transcriber.transcribe(Bytes::from(audio), &filename).await.context("transcribe audio")?;
    drop(_s);

    if telemetry::config::json_mode() {
        log.result(&TranscribeResult { file: args.file.display().to_string(), text })?;
    } else {
        println!("{}", text);
    }
    Ok(())
}

#[derive(Args)]
pub struct SpeakCmd {
    /// Text to speak
    text: String,
    #[arg(long, default_value = "output.mp3")]
    out: PathBuf,
    /// Check the API key against /voices before synthesizing
    #[arg(long, default_value_t = false)]
    validate_key: bool,
}

#[derive(Serialize)]
struct SpeakResult {
    out: String,
    bytes: usize,
}

pub async fn run_speak(args: SpeakCmd) -> Result<()> {
    let log = telemetry::speak();
    let _g = log.root_span_kv([
        ("chars", args.text.chars().count().to_string()),
        ("out", args.out.display().to_string()),
    ]).entered();

    let synth = ElevenLabsSynthesizer::new(ElevenLabsConfig::from_env()).context("init synthesizer")?;
    if args.validate_key {
        synth.validate_key().await.context("validate ElevenLabs API key")?;
        log.info("ElevenLabs API key validated");
    }

    let _s = log.span(&Phase::Request).entered();
    let audio = synth.synthesize(&args.text).await.context("synthesize speech")?;
    drop(_s);

    let _s = log.span(&Phase::Write).entered();
    tokio::fs::write(&args.out, &audio)
        .await
        .with_context(|| format!("write {}", args.out.display()))?;
    drop(_s);

    log.info(format!("🔊 wrote {} bytes to {}", audio.len(), args.out.display()));
    if telemetry::config::json_mode() {
        log.result(&SpeakResult { out: args.out.display().to_string(), bytes: audio.len() })?;
    }
    Ok(())
}
