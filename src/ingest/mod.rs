//! Ingestion pipeline
//!
//! Selects the single line source for this process, classifies every line it
//! delivers and passes the result (record or `None`) to the consumer.

pub mod relay;

use std::sync::Arc;
use tracing::info;

use crate::app::Config;
use crate::classify::{ClassifiedRecord, LineClassifier};
use crate::source::{
    webhook::setup_command, FileTailSource, LineHandler, LineSource, SourceError, WebhookSource,
};

pub use relay::{channel_consumer, write_json_lines};

/// Downstream callback receiving one result per delivered line
pub type Consumer = Arc<dyn Fn(Option<ClassifiedRecord>) + Send + Sync>;

/// Build the line source selected by `is_local_file`
///
/// A missing log file or an unbindable port is returned as an error before any
/// line is read.
pub async fn source_from_config(config: &Config) -> Result<Box<dyn LineSource>, SourceError> {
    if config.is_local_file {
        let source = FileTailSource::new(config.file.clone())?;
        return Ok(Box::new(source));
    }

    let source = WebhookSource::bind(config.webhook.clone()).await?;
    if config.webhook.show_init_message {
        let port = source.local_addr()?.port();
        setup_command(
            &config.webhook,
            port,
            config.server_prefix(),
            config.patterns.show_player_me,
        )
        .log();
    }
    Ok(Box::new(source))
}

/// Classifier plus consumer, driven by one source
#[derive(Clone)]
pub struct Ingestion {
    classifier: Arc<LineClassifier>,
    consumer: Consumer,
}

impl Ingestion {
    pub fn new(classifier: LineClassifier, consumer: Consumer) -> Self {
        Self {
            classifier: Arc::new(classifier),
            consumer,
        }
    }

    /// Handler classifying a line and forwarding the result
    pub fn handler(&self) -> LineHandler {
        let classifier = self.classifier.clone();
        let consumer = self.consumer.clone();
        Arc::new(move |line: String| {
            let record = classifier.classify(&line);
            consumer(record);
        })
    }

    /// Run `source` until it stops
    pub async fn run(self, source: Box<dyn LineSource>) -> Result<(), SourceError> {
        info!("Starting {} source", source.name());
        source.run(self.handler()).await
    }
}
