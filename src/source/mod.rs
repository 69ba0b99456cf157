//! Raw line sources
//!
//! A source turns an external origin (a growing log file, or HTTP pushes) into
//! a sequence of raw lines handed to a [`LineHandler`]. Exactly one source is
//! active per process.

pub mod file_tail;
pub mod webhook;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use file_tail::{FileTailConfig, FileTailSource};
pub use webhook::{WebhookConfig, WebhookSource};

/// Callback invoked once per raw line, possibly from several tasks at once
pub type LineHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The log file to tail does not exist
    #[error("Local log file not found at \"{}\"", .0.display())]
    FileNotFound(PathBuf),

    /// The webhook listener could not bind its port
    #[error("Failed to bind webhook on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading the origin
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File watcher error
    #[error("File watching error: {0}")]
    Watch(#[from] notify::Error),

    /// HTTP server stopped with an error
    #[error("Server error: {0}")]
    Server(String),
}

/// A producer of raw lines
#[async_trait]
pub trait LineSource: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Deliver lines to `handler` until the origin ends or a fatal error occurs
    async fn run(self: Box<Self>, handler: LineHandler) -> Result<(), SourceError>;
}
