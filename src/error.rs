use axum::http::StatusCode;
use thiserror::Error;

use crate::encoder::EmbedError;
use crate::extract::ExtractError;
use crate::llm::OpenAiError;
use crate::pipeline::chunk::ChunkError;
use crate::speech::SpeechError;
use crate::store::StoreError;

/// Pipeline failure tagged with the collaborator that caused it.
#[derive(Debug, Error)]
pub enum DocTalkError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("could not read PDF: {0}")]
    Extraction(#[from] ExtractError),
    #[error("Could not extract text from PDF")]
    NoText,
    #[error(transparent)]
    Chunking(#[from] ChunkError),
    #[error("Could not create chunks from PDF text")]
    NoChunks,
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
    #[error("vector store failed: {0}")]
    Storage(#[from] StoreError),
    #[error("language model failed: {0}")]
    Llm(#[from] OpenAiError),
    #[error("transcription failed: {0}")]
    Transcription(#[source] SpeechError),
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] SpeechError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DocTalkError {
    pub fn kind(&self) -> &'static str {
        match self {
            DocTalkError::BadRequest(_) => "bad_request",
            DocTalkError::Extraction(_) => "extraction",
            DocTalkError::NoText => "no_text",
            DocTalkError::Chunking(_) => "chunking",
            DocTalkError::NoChunks => "no_chunks",
            DocTalkError::Embedding(_) => "embedding",
            DocTalkError::Storage(_) => "storage",
            DocTalkError::Llm(_) => "llm",
            DocTalkError::Transcription(_) => "transcription",
            DocTalkError::Synthesis(_) => "synthesis",
            DocTalkError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DocTalkError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DocTalkError::Transcription(SpeechError::EmptyInput)
            | DocTalkError::Synthesis(SpeechError::EmptyInput) => StatusCode::BAD_REQUEST,
            DocTalkError::Extraction(_) | DocTalkError::NoText | DocTalkError::NoChunks => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DocTalkError::Embedding(_)
            | DocTalkError::Llm(_)
            | DocTalkError::Transcription(_)
            | DocTalkError::Synthesis(_) => StatusCode::BAD_GATEWAY,
            DocTalkError::Chunking(_) | DocTalkError::Storage(_) | DocTalkError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(DocTalkError::NoText.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(DocTalkError::NoText.to_string(), "Could not extract text from PDF");
        assert_eq!(DocTalkError::BadRequest("x".into()).kind(), "bad_request");
        assert_eq!(
            DocTalkError::Synthesis(SpeechError::EmptyInput).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DocTalkError::Synthesis(SpeechError::Unauthorized).status(),
            StatusCode::BAD_GATEWAY
        );
        let chunking: DocTalkError = ChunkError::SplitFailed("gap".into()).into();
        assert_eq!(chunking.kind(), "chunking");
        assert_eq!(chunking.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
