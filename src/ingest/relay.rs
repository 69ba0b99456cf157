//! Channel hand-off consumer
//!
//! The consumer callback runs inside the source's delivery path, so it only
//! enqueues; a separate task drains the queue and writes JSON lines.

use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Consumer;
use crate::classify::ClassifiedRecord;

/// Consumer that enqueues records without blocking
///
/// Ignored lines are dropped here. When the queue is full the record is dropped
/// with a warning.
pub fn channel_consumer(capacity: usize) -> (Consumer, mpsc::Receiver<ClassifiedRecord>) {
    let (tx, rx) = mpsc::channel(capacity);
    let consumer: Consumer = Arc::new(move |record: Option<ClassifiedRecord>| {
        if let Some(record) = record {
            if let Err(e) = tx.try_send(record) {
                warn!("Dropping record, relay not keeping up: {}", e);
            }
        }
    });
    (consumer, rx)
}

/// Write each record as one JSON line until the channel closes
pub async fn write_json_lines<W>(
    mut rx: mpsc::Receiver<ClassifiedRecord>,
    mut writer: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(record) = rx.recv().await {
        debug!("Relaying message from {}", record.username());
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
