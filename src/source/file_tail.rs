//! Local log file tailing
//!
//! Follows a growing file (typically `logs/latest.log`) and delivers each
//! appended line once, in append order. Reading starts at the end of the file
//! as it was when the source was created.

use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs::{File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{LineHandler, LineSource, SourceError};

/// Configuration for tailing a local log file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTailConfig {
    /// Log file to follow
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Poll the file size instead of relying on filesystem events
    #[serde(default = "default_use_polling")]
    pub use_polling: bool,
    /// Poll interval; also the safety re-check interval in event mode
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("logs/latest.log")
}

fn default_use_polling() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for FileTailConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            use_polling: default_use_polling(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Device and inode of a file; `None` where the platform does not expose them
type FileId = Option<(u64, u64)>;

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> FileId {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> FileId {
    None
}

/// Incremental reader tracking the last consumed byte offset
#[derive(Debug)]
struct TailReader {
    path: PathBuf,
    /// Identity of the file `position` refers to
    id: FileId,
    position: u64,
    /// Bytes of a line whose newline has not arrived yet
    pending: Vec<u8>,
}

impl TailReader {
    fn open_at_end(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            id: file_id(&metadata),
            position: metadata.len(),
            pending: Vec::new(),
        })
    }

    /// Read complete lines appended since the last call
    fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        let metadata = std::fs::metadata(&self.path)?;
        let len = metadata.len();
        let id = file_id(&metadata);

        if id != self.id || len < self.position {
            warn!(
                "Log file {} was truncated or rotated, resuming at end of file",
                self.path.display()
            );
            self.id = id;
            self.position = len;
            self.pending.clear();
            return Ok(Vec::new());
        }
        if len == self.position {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.position))?;
        let mut buf = Vec::new();
        let read = file.take(len - self.position).read_to_end(&mut buf)?;
        self.position += read as u64;
        self.pending.extend_from_slice(&buf);

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=idx).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        Ok(lines)
    }

    fn deliver(&mut self, handler: &LineHandler) {
        match self.read_lines() {
            Ok(lines) => {
                for line in lines {
                    handler(line);
                }
            }
            Err(e) => {
                warn!("Error tailing log file: {}", e);
            }
        }
    }
}

/// Source following appends to a local file
#[derive(Debug)]
pub struct FileTailSource {
    config: FileTailConfig,
    reader: TailReader,
}

impl FileTailSource {
    /// Open the file and position at its end
    ///
    /// A missing file is a configuration error and is not retried.
    pub fn new(config: FileTailConfig) -> Result<Self, SourceError> {
        if !config.path.exists() {
            return Err(SourceError::FileNotFound(config.path.clone()));
        }
        let reader = TailReader::open_at_end(&config.path)?;

        info!(
            "Using configuration for local log file at \"{}\"",
            config.path.display()
        );

        Ok(Self { config, reader })
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    async fn run_polling(mut self, handler: LineHandler) -> Result<(), SourceError> {
        let mut ticker = tokio::time::interval(self.interval());
        loop {
            ticker.tick().await;
            self.reader.deliver(&handler);
        }
    }

    async fn run_events(mut self, handler: LineHandler) -> Result<(), SourceError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })?;

        let watch_dir = self
            .config
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        debug!("Watching {} for changes", watch_dir.display());

        let file_name = self.config.path.file_name().map(|n| n.to_os_string());
        let mut ticker = tokio::time::interval(self.interval());

        loop {
            tokio::select! {
                Some(res) = rx.recv() => match res {
                    Ok(event) => {
                        let relevant = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                        if relevant {
                            self.reader.deliver(&handler);
                        }
                    }
                    Err(e) => {
                        warn!("Error tailing log file: {}", e);
                    }
                },
                _ = ticker.tick() => {
                    self.reader.deliver(&handler);
                }
            }
        }
    }
}

#[async_trait]
impl LineSource for FileTailSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn run(self: Box<Self>, handler: LineHandler) -> Result<(), SourceError> {
        if self.config.use_polling {
            info!("Polling log file every {}ms", self.config.poll_interval_ms);
            (*self).run_polling(handler).await
        } else {
            info!("Watching log file for change events");
            (*self).run_events(handler).await
        }
    }
}
