pub mod init;
pub mod chunk;
pub mod ingest;
pub mod ask;
pub mod delete;
pub mod speech;
pub mod serve;
