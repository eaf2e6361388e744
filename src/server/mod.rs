pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::answer::{AnswerConfig, AnswerFormat, DEFAULT_TOP_K};
use crate::encoder::EmbedArgs;
use crate::pipeline::chunk::ChunkArgs;
use crate::services::{Services, StoreArgs};
use crate::telemetry;
use crate::telemetry::ops::serve::Phase;

#[derive(Args)]
pub struct ServeCmd {
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: SocketAddr,
    /// Allowed browser origin; repeat for several
    #[arg(long = "cors-origin", default_value = "http://localhost:3000")]
    cors_origins: Vec<String>,
    #[arg(long, default_value_t = 25)]
    max_upload_mb: usize,
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    k: usize,
    #[arg(long, value_enum, default_value_t = AnswerFormat::Html)]
    format: AnswerFormat,
    #[command(flatten)]
    chunking: ChunkArgs,
    #[command(flatten)]
    embed: EmbedArgs,
    #[command(flatten)]
    store: StoreArgs,
}

pub struct AppState {
    pub services: Services,
    pub answer_cfg: AnswerConfig,
}

/// All API routes over shared state. CORS and body limits are layered by `run`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/process-pdf", post(handlers::process_pdf))
        .route("/api/ask", post(handlers::ask))
        .route("/api/transcribe", post(handlers::transcribe))
        .route("/api/synthesize", post(handlers::synthesize))
        .route("/api/delete-all-documents", delete(handlers::delete_all_documents))
        .route("/api/delete-documents/{id}", delete(handlers::delete_document))
        .route("/api/test-vectorstore", get(handlers::test_vectorstore))
        .with_state(state)
}

fn cors(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {:?}", o)))
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any))
}

pub async fn run(dsn: Option<&str>, args: ServeCmd) -> Result<()> {
    let log = telemetry::serve();
    let _g = log.root_span_kv([
        ("addr", args.addr.to_string()),
        ("store", format!("{:?}", args.store.store)),
        ("embedder", format!("{:?}", args.embed.embedder)),
    ]).entered();

    let policy = args.chunking.policy().context("chunking options")?;
    let services = Services::connect(dsn, &args.store, &args.embed).await?.with_chunker(policy);
    let state = Arc::new(AppState {
        services,
        answer_cfg: AnswerConfig { k: args.k, format: args.format, ..AnswerConfig::default() },
    });

    let app = router(state)
        .layer(DefaultBodyLimit::max(args.max_upload_mb.max(1) * 1024 * 1024))
        .layer(cors(&args.cors_origins)?);

    let listener = {
        let _s = log.span(&Phase::Bind).entered();
        tokio::net::TcpListener::bind(args.addr)
            .await
            .with_context(|| format!("bind {}", args.addr))?
    };
    log.info(format!("🚀 DocTalk API listening on http://{}", args.addr));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let _s = log.span(&Phase::Listen).entered();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serve")?;
    log.info("Server stopped");
    Ok(())
}
