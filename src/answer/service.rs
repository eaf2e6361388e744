use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;

use crate::encoder::Embedder;
use crate::error::DocTalkError;
use crate::llm::{ChatCompletionRequest, LlmClient, UsageMetrics};
use crate::store::{SourceDocument, VectorStore};
use crate::telemetry;
use crate::telemetry::ops::ask::Phase;

use super::prompt::{build_messages, format_answer, AnswerFormat, ChatTurn, NO_CONTEXT_ANSWER};

pub const DEFAULT_TOP_K: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct AnswerConfig {
    pub k: usize,
    pub format: AnswerFormat,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self { k: DEFAULT_TOP_K, format: AnswerFormat::Plain, model: None, max_tokens: None }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetrics>,
}

/// Retrieval-augmented answering over the vector store.
#[derive(Clone)]
pub struct Answerer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmClient>,
    cfg: AnswerConfig,
}

impl Answerer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
        cfg: AnswerConfig,
    ) -> Self {
        Self { embedder, store, llm, cfg }
    }

    pub fn config(&self) -> &AnswerConfig { &self.cfg }

    /// Top-k retrieval for a question, closest first.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SourceDocument>, DocTalkError> {
        let log = telemetry::ask();
        let qvec = self.embedder.embed_query(question).instrument(log.span(&Phase::EmbedQuery)).await?;
        let docs = self.store.search(&qvec, k).instrument(log.span(&Phase::Retrieve)).await?;
        log.info(format!("Retrieved {} relevant chunk(s)", docs.len()));
        Ok(docs)
    }

    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<Answer, DocTalkError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocTalkError::BadRequest("question is empty".into()));
        }
        let log = telemetry::ask();

        let sources = self.retrieve(question, self.cfg.k.max(1)).await?;
        if sources.is_empty() {
            log.warn("No relevant chunks; skipping the language model");
            return Ok(Answer { answer: NO_CONTEXT_ANSWER.to_string(), sources, usage: None });
        }

        let request = {
            let _s = log.span(&Phase::Prompt).entered();
            ChatCompletionRequest {
                model: self.cfg.model.clone(),
                messages: build_messages(question, &sources, history),
                max_tokens: self.cfg.max_tokens,
                temperature: None,
                top_p: None,
            }
        };

        let response = match self.llm.chat_completion(request.clone()).instrument(log.span(&Phase::Complete)).await {
            Err(e) if e.is_retryable() => {
                log.warn(format!("LLM call failed ({}); retrying once", e));
                tokio::time::sleep(RETRY_DELAY).await;
                self.llm.chat_completion(request).instrument(log.span(&Phase::Complete)).await?
            }
            other => other?,
        };
        if response.finish_reason.as_deref() == Some("length") {
            log.warn("Answer was truncated by the token limit");
        }

        Ok(Answer {
            answer: format_answer(&response.content, self.cfg.format),
            sources,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletionResponse, ChatRole, MockClient, OpenAiError};
    use crate::pipeline::chunk::ChunkingPolicy;
    use crate::pipeline::ingest::IngestPipeline;
    use crate::store::MemoryStore;
    use crate::testing::{long_document, HashEmbedder, StaticExtractor};

    async fn loaded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        IngestPipeline::new(
            Arc::new(StaticExtractor::text(&long_document())),
            ChunkingPolicy::default(),
            Arc::new(HashEmbedder::default()),
            store.clone(),
        )
        .ingest("nature.pdf", vec![], true)
        .await
        .unwrap();
        store
    }

    fn answerer(store: Arc<MemoryStore>, llm: Arc<MockClient>, cfg: AnswerConfig) -> Answerer {
        Answerer::new(Arc::new(HashEmbedder::default()), store, llm, cfg)
    }

    #[tokio::test]
    async fn empty_store_returns_apology_without_calling_llm() {
        let llm = Arc::new(MockClient::new());
        let a = answerer(Arc::new(MemoryStore::new()), llm.clone(), AnswerConfig::default());
        let out = a.answer("What do zebras eat?", &[]).await.unwrap();
        assert_eq!(out.answer, NO_CONTEXT_ANSWER);
        assert!(out.sources.is_empty());
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn answer_uses_retrieved_context_and_history() {
        let store = loaded_store().await;
        let llm = Arc::new(MockClient::new());
        llm.push_response(Ok(ChatCompletionResponse::text("They graze on the savanna.")));
        let cfg = AnswerConfig { k: 2, ..AnswerConfig::default() };
        let a = answerer(store, llm.clone(), cfg);

        let history = vec![ChatTurn { role: ChatRole::User, content: "Hello".into() }];
        let out = a.answer("Where do zebras graze?", &history).await.unwrap();

        assert_eq!(out.answer, "They graze on the savanna.");
        assert_eq!(out.sources.len(), 2);
        assert!(out.sources[0].text.contains("Zebras"));

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages.len(), 3);
        assert!(calls[0].messages[2].content.contains("Zebras graze"));
        assert!(calls[0].messages[2].content.contains("Question: Where do zebras graze?"));
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_once() {
        let store = loaded_store().await;
        let llm = Arc::new(MockClient::new());
        llm.push_response(Err(OpenAiError::Timeout));
        llm.push_response(Ok(ChatCompletionResponse::text("line one\nline two")));
        let cfg = AnswerConfig { format: AnswerFormat::Html, ..AnswerConfig::default() };
        let out = answerer(store, llm.clone(), cfg).answer("tides", &[]).await.unwrap();
        assert_eq!(out.answer, "<h3>Summary of the Document:</h3><ul><li>line one</li><li>line two</li></ul>");
        assert_eq!(llm.calls().len(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_surfaces_as_llm_error() {
        let store = loaded_store().await;
        let llm = Arc::new(MockClient::new());
        llm.push_response(Err(OpenAiError::MissingApiKey));
        let err = answerer(store, llm.clone(), AnswerConfig::default()).answer("glaciers", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "llm");
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn blank_question_is_a_bad_request() {
        let llm = Arc::new(MockClient::new());
        let err = answerer(Arc::new(MemoryStore::new()), llm, AnswerConfig::default()).answer("  ", &[]).await.unwrap_err();
        assert!(matches!(err, DocTalkError::BadRequest(_)));
    }
}
