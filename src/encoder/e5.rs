use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use hf_hub::api::sync::Api;
use ndarray::{s, Array2, Array3, ArrayD, Axis};
use ort::inputs;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::Value;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::{l2_normalize, Device, EmbedError, Embedder};

pub const DEFAULT_MODEL: &str = "intfloat/e5-small-v2";
const MAX_TOKENS: usize = 512;

struct Inner {
    tok: Tokenizer,
    session: Mutex<Session>,
}

/// Local E5 sentence encoder: `passage: ` / `query: ` prefixes, mean pooling
/// over the attention mask, L2 normalization.
#[derive(Clone)]
pub struct E5Encoder {
    model_id: String,
    inner: Arc<Inner>,
}

impl E5Encoder {
    pub fn new(model_id: &str, onnx_filename: Option<&str>, device: Device) -> Result<Self> {
        let tok = load_tokenizer(model_id).context("load tokenizer via HF Hub")?;
        let onnx_path = resolve_onnx(model_id, onnx_filename).context("resolve ONNX model via HF Hub")?;
        let session = build_session(&onnx_path, device)?;
        Ok(Self {
            model_id: model_id.to_string(),
            inner: Arc::new(Inner { tok, session: Mutex::new(session) }),
        })
    }

    async fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() { return Ok(vec![]); }
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.run(&texts))
            .await
            .map_err(|e| EmbedError::Worker(e.to_string()))?
            .map_err(|e| EmbedError::Model(format!("{e:#}")))
    }
}

#[async_trait]
impl Embedder for E5Encoder {
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.encode(texts.iter().map(|t| format!("passage: {t}")).collect()).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut out = self.encode(vec![format!("query: {text}")]).await?;
        out.pop().ok_or(EmbedError::Count { expected: 1, got: 0 })
    }

    fn model_tag(&self) -> &str { &self.model_id }
}

impl Inner {
    fn run(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self.tok
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("{}", e))?;
        let batch = encodings.len();
        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        if batch == 0 || max_len == 0 { bail!("tokenizer produced no tokens"); }

        let mut ids = Array2::<i64>::zeros((batch, max_len));
        let mut mask = Array2::<i64>::zeros((batch, max_len));
        let mut type_ids = Array2::<i64>::zeros((batch, max_len));
        for (i, enc) in encodings.iter().enumerate() {
            let types = enc.get_type_ids();
            for (j, (&id, &m)) in enc.get_ids().iter().zip(enc.get_attention_mask()).enumerate() {
                ids[[i, j]] = id as i64;
                mask[[i, j]] = m as i64;
                type_ids[[i, j]] = types.get(j).copied().unwrap_or(0) as i64;
            }
        }

        let input_ids_val = Value::from_array(ids).map_err(|e| anyhow!("{}", e))?;
        let attn_mask_val = Value::from_array(mask.clone()).map_err(|e| anyhow!("{}", e))?;
        let type_ids_val = Value::from_array(type_ids).map_err(|e| anyhow!("{}", e))?;

        let mut session = self.session.lock().map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session
            .run(inputs! {
                "input_ids" => &input_ids_val,
                "attention_mask" => &attn_mask_val,
                "token_type_ids" => &type_ids_val,
            })
            .map_err(|e| anyhow!("{}", e))?;

        let first = outputs.iter().next().map(|(_n, v)| v).ok_or_else(|| anyhow!("no outputs from ONNX session"))?;
        let arr: ArrayD<f32> = first.try_extract_array().map_err(|e| anyhow!("{}", e))?.to_owned();
        match arr.ndim() {
            // already pooled: [batch, dim]
            2 => Ok((0..arr.shape()[0])
                .map(|i| l2_normalize(arr.slice(s![i, ..]).to_vec()))
                .collect()),
            3 => {
                let arr3: Array3<f32> = arr.into_dimensionality().map_err(|_| anyhow!("expect 3D output"))?;
                Ok(mean_pool(&arr3, &mask))
            }
            n => bail!("unexpected output rank {n}; expected 2 or 3"),
        }
    }
}

// [batch, seq, dim] hidden states -> [batch][dim], masked mean then L2
fn mean_pool(hidden: &Array3<f32>, mask: &Array2<i64>) -> Vec<Vec<f32>> {
    let mask3 = mask.map(|&m| m as f32).insert_axis(Axis(2));
    (0..hidden.shape()[0])
        .map(|i| {
            let hs = hidden.slice(s![i, .., ..]);
            let m = mask3.slice(s![i, .., ..]);
            let num = (&hs * &m).sum_axis(Axis(0));
            let denom = m.sum_axis(Axis(0))[[0]].max(1e-6);
            l2_normalize((num / denom).to_vec())
        })
        .collect()
}

fn load_tokenizer(model_id: &str) -> Result<Tokenizer> {
    let mut tok = Tokenizer::from_pretrained(model_id, None).map_err(|e| anyhow!("{}", e))?;
    tok.with_truncation(Some(TruncationParams { max_length: MAX_TOKENS, ..Default::default() }))
        .map_err(|e| anyhow!("{}", e))?;
    let pad_id = tok.token_to_id("[PAD]").unwrap_or(0);
    tok.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token: "[PAD]".to_string(),
        ..Default::default()
    }));
    Ok(tok)
}

fn resolve_onnx(model_id: &str, onnx_filename: Option<&str>) -> Result<PathBuf> {
    let api = Api::new()?;
    let repo = api.model(model_id.to_string());

    if let Some(name) = onnx_filename {
        return Ok(repo.get(name)?);
    }
    for name in ["onnx/model.onnx", "model.onnx"] {
        if let Ok(p) = repo.get(name) { return Ok(p); }
    }
    bail!("Could not find an ONNX file in {model_id}. Pass --onnx-filename to override.")
}

fn build_session(onnx_path: &Path, device: Device) -> Result<Session> {
    let builder = SessionBuilder::new()
        .map_err(|e| anyhow!("{}", e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| anyhow!("{}", e))?;

    #[allow(unreachable_code)]
    let builder = match device {
        Device::Cpu => builder,
        Device::Cuda => {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                builder
                    .with_execution_providers([CUDAExecutionProvider::default().into()])
                    .map_err(|e| anyhow!("{}", e))?
            }
            #[cfg(not(feature = "cuda"))]
            {
                bail!("Binary built without CUDA support. Rebuild with `--features cuda`.")
            }
        }
    };

    let model_bytes = std::fs::read(onnx_path).with_context(|| format!("read {}", onnx_path.display()))?;
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| anyhow!("{}", e))
}
