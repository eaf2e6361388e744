pub mod chunk;
pub mod ingest;
