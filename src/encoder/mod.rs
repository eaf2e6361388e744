pub mod e5;
pub mod openai;

use async_trait::async_trait;
use clap::Args;
use thiserror::Error;

pub use e5::E5Encoder;
pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig};

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("model error: {0}")]
    Model(String),
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error {status}: {message}")]
    Api { status: reqwest::StatusCode, message: String },
    #[error("expected {expected} vectors, got {got}")]
    Count { expected: usize, got: usize },
    #[error("expected dimension {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    #[error("embedding worker failed: {0}")]
    Worker(String),
}

/// Text to vector encoder. Passages and queries may be encoded differently.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.embed_passages(&[text.to_string()]).await?;
        out.pop().ok_or(EmbedError::Count { expected: 1, got: 0 })
    }

    /// Name recorded next to stored vectors.
    fn model_tag(&self) -> &str;
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum Device {
    #[value(name = "cpu")] Cpu,
    #[value(name = "cuda")] Cuda,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbedderKind {
    /// Local ONNX E5 encoder
    #[value(name = "e5")] E5,
    /// OpenAI-compatible /embeddings endpoint
    #[value(name = "openai")] OpenAi,
}

/// Embedding flags shared by ingest, ask and serve.
#[derive(Args, Clone, Debug)]
pub struct EmbedArgs {
    #[arg(long, value_enum, default_value_t = EmbedderKind::E5)]
    pub embedder: EmbedderKind,
    #[arg(long, default_value = e5::DEFAULT_MODEL)]
    pub e5_model: String,
    #[arg(long)]
    pub onnx_filename: Option<String>,
    #[arg(long, value_enum, default_value_t = Device::Cpu)]
    pub device: Device,
}

pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt() as f32;
    if norm > 0.0 {
        for x in &mut v { *x /= norm; }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_gives_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
