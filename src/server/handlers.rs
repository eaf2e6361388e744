use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::answer::ChatTurn;
use crate::error::DocTalkError;
use crate::speech::SpeechError;
use crate::store::SourceDocument;
use crate::telemetry;

use super::AppState;

/// Error body `{error, kind}` with the status of the failing collaborator.
pub struct ApiError(pub DocTalkError);

impl<E: Into<DocTalkError>> From<E> for ApiError {
    fn from(err: E) -> Self { ApiError(err.into()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            telemetry::serve().error(format!("{} ({})", self.0, self.0.kind()));
        } else {
            telemetry::serve().warn(format!("{} ({})", self.0, self.0.kind()));
        }
        (status, Json(json!({ "error": self.0.to_string(), "kind": self.0.kind() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

struct Upload {
    filename: String,
    bytes: bytes::Bytes,
}

// First part named `file`, or the first part with a filename.
async fn read_upload(mut multipart: Multipart, fallback_name: &str) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocTalkError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().unwrap_or(fallback_name).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DocTalkError::BadRequest(format!("failed to read upload: {e}")))?;
        return Ok(Upload { filename, bytes });
    }
    Err(DocTalkError::BadRequest("no file provided".into()).into())
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "DocTalk API is running",
        "endpoints": {
            "PDF Processing": "/api/process-pdf",
            "Ask Questions": "/api/ask",
            "Speech to Text": "/api/transcribe",
            "Text to Speech": "/api/synthesize",
            "Delete All Documents": "/api/delete-all-documents",
            "Delete Document": "/api/delete-documents/{id}",
            "Vector Store Check": "/api/test-vectorstore"
        }
    }))
}

#[derive(Deserialize)]
pub struct ProcessParams {
    #[serde(default = "replace_default")]
    replace: bool,
}

fn replace_default() -> bool { true }

#[derive(Serialize)]
pub struct ProcessResponse {
    message: &'static str,
    chunks: usize,
    stored_documents: usize,
    text_length: usize,
}

pub async fn process_pdf(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProcessParams>,
    multipart: Multipart,
) -> ApiResult<Json<ProcessResponse>> {
    let upload = read_upload(multipart, "upload.pdf").await?;
    if upload.bytes.is_empty() {
        return Err(DocTalkError::BadRequest("uploaded file is empty".into()).into());
    }
    let report = state
        .services
        .ingest_pipeline()
        .ingest(&upload.filename, upload.bytes.to_vec(), params.replace)
        .await?;
    Ok(Json(ProcessResponse {
        message: "PDF processed successfully",
        chunks: report.chunks,
        stored_documents: report.stored_documents,
        text_length: report.text_length,
    }))
}

#[derive(Deserialize)]
pub struct AskRequest {
    text: String,
    #[serde(default)]
    chat_history: Vec<ChatTurn>,
}

#[derive(Serialize)]
pub struct AskResponse {
    answer: String,
    sources: Vec<SourceDocument>,
}

pub async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> ApiResult<Json<AskResponse>> {
    let log = telemetry::ask();
    log.info(format!("Query sent to AI: {}", req.text));
    let answer = state
        .services
        .answerer(state.answer_cfg.clone())
        .answer(&req.text, &req.chat_history)
        .await?;
    Ok(Json(AskResponse { answer: answer.answer, sources: answer.sources }))
}

pub async fn transcribe(State(state): State<Arc<AppState>>, multipart: Multipart) -> ApiResult<Json<Value>> {
    let upload = read_upload(multipart, "audio.wav").await?;
    let text = state
        .services
        .transcriber
        .transcribe(upload.bytes, &upload.filename)
        .await
        .map_err(DocTalkError::Transcription)?;
    Ok(Json(json!({ "text": text })))
}

#[derive(Deserialize)]
pub struct SynthesizeParams {
    text: String,
}

/// `text` comes as a query parameter; the response body is mp3 audio.
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SynthesizeParams>,
) -> ApiResult<Response> {
    if params.text.trim().is_empty() {
        return Err(DocTalkError::Synthesis(SpeechError::EmptyInput).into());
    }
    let audio = state
        .services
        .synthesizer
        .synthesize(&params.text)
        .await
        .map_err(DocTalkError::Synthesis)?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

pub async fn delete_all_documents(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let deleted = state.services.store.delete_all().await?;
    telemetry::delete().info(format!("🗑️  deleted {} chunk(s)", deleted));
    Ok(Json(json!({
        "status": "success",
        "message": "Successfully deleted all documents from the vector store",
        "deleted": deleted,
    })))
}

pub async fn delete_document(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let uuid = Uuid::parse_str(&id).map_err(|_| DocTalkError::BadRequest(format!("invalid document id {id:?}")))?;
    let deleted = state.services.store.delete(&[uuid]).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Successfully deleted document {id}"),
        "deleted": deleted,
    })))
}

pub async fn test_vectorstore(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let hits = state.services.answerer(state.answer_cfg.clone()).retrieve("test", 1).await?;
    Ok(Json(json!({
        "status": "success",
        "document_found": !hits.is_empty(),
        "sample_content": hits.first().map(|d| d.text.clone()),
    })))
}
