pub mod app;
pub mod classify;
pub mod ingest;
pub mod source;
