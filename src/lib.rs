pub mod answer;
pub mod delete;
pub mod encoder;
pub mod error;
pub mod extract;
pub mod init;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod speech;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::DocTalkError;
pub use pipeline::chunk::{split, ChunkConfig, ChunkError, ChunkingPolicy};
