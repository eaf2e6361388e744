//! Offline collaborators shared by unit tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::encoder::{l2_normalize, EmbedError, Embedder};
use crate::extract::{ExtractError, PdfExtractor};
use crate::speech::{SpeechError, Synthesizer, Transcriber};

/// Bag-of-words hashing embedder: texts sharing words land close together.
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self { Self { dim: 512 } }
}

impl HashEmbedder {
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % self.dim as u64) as usize] += 1.0;
        }
        l2_normalize(v)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_tag(&self) -> &str { "hash-512" }
}

pub struct StaticExtractor {
    result: Result<String, String>,
}

impl StaticExtractor {
    pub fn text(text: &str) -> Self { Self { result: Ok(text.to_string()) } }
    pub fn failing(reason: &str) -> Self { Self { result: Err(reason.to_string()) } }
}

impl PdfExtractor for StaticExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<String, ExtractError> {
        self.result.clone().map_err(ExtractError::Invalid)
    }
}

pub struct StaticTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, audio: Bytes, _filename: &str) -> Result<String, SpeechError> {
        if audio.is_empty() { return Err(SpeechError::EmptyInput); }
        Ok(self.0.to_string())
    }
}

pub struct StaticSynthesizer;

#[async_trait]
impl Synthesizer for StaticSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        if text.trim().is_empty() { return Err(SpeechError::EmptyInput); }
        Ok(Bytes::from(format!("ID3{}", text.len())))
    }
}

/// About 2.4k chars in eight topical paragraphs.
pub fn long_document() -> String {
    let topics = [
        "Zebras graze on the open savanna and live in large herds for protection.",
        "Glaciers carve valleys slowly as compacted snow turns into moving ice.",
        "Volcanoes release magma, ash and gas when pressure builds below the crust.",
        "Coral reefs shelter thousands of marine species in warm shallow water.",
        "Honeybees communicate the location of flowers through a waggle dance.",
        "Deserts receive little rain, yet many plants store water in thick stems.",
        "Rainforests hold most of the land species on Earth under a dense canopy.",
        "Tides rise and fall twice a day because of the pull of the moon.",
    ];
    topics
        .iter()
        .map(|sentence| {
            let mut para = String::new();
            while para.len() < 280 {
                if !para.is_empty() { para.push(' '); }
                para.push_str(sentence);
            }
            para
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
