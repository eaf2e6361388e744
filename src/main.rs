use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::env;

use doctalk::{answer, delete, init, pipeline, server, speech, telemetry};

#[derive(Parser)]
#[command(name = "doctalk", about = "Ask questions about PDF documents")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    Chunk(pipeline::chunk::ChunkCmd),
    Ingest(pipeline::ingest::IngestCmd),
    Ask(answer::AskCmd),
    Delete(delete::DeleteCmd),
    Transcribe(speech::TranscribeCmd),
    Speak(speech::SpeakCmd),
    Serve(server::ServeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // stderr; RUST_LOG and DOCTALK_LOG_FORMAT
    telemetry::config::init_tracing();
    let dsn = cli.dsn.or_else(|| env::var("DATABASE_URL").ok());
    let dsn = dsn.as_deref();

    match cli.command {
        Commands::Init(args) => init::run(dsn, args).await?,
        Commands::Chunk(args) => pipeline::chunk::run(args).await?,
        Commands::Ingest(args) => pipeline::ingest::run(dsn, args).await?,
        Commands::Ask(args) => answer::run(dsn, args).await?,
        Commands::Delete(args) => delete::run(dsn, args).await?,
        Commands::Transcribe(args) => speech::run_transcribe(args).await?,
        Commands::Speak(args) => speech::run_speak(args).await?,
        Commands::Serve(args) => server::run(dsn, args).await?,
    }

    Ok(())
}
