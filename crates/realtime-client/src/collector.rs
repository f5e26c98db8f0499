//! HTTP delivery of log-collector events.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use voicedesk_core::{EventSink, LogEvent};

/// Events waiting for delivery before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Posts events as JSON to a collector URL from a background task.
///
/// `publish` only enqueues, so a slow or unreachable collector never holds
/// up the session loop. When the queue is full the event is dropped.
/// Must be created inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpSink {
    queue: mpsc::Sender<LogEvent>,
}

impl HttpSink {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self::with_capacity(http, url, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(http: reqwest::Client, url: impl Into<String>, capacity: usize) -> Self {
        let url = url.into();
        let (queue, mut pending) = mpsc::channel::<LogEvent>(capacity.max(1));
        tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                deliver(&http, &url, &event).await;
            }
            debug!("Collector queue closed");
        });
        Self { queue }
    }
}

async fn deliver(http: &reqwest::Client, url: &str, event: &LogEvent) {
    let name = event.name();
    match http.post(url).json(event).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(event = name, "Event delivered to collector")
        }
        Ok(response) => {
            warn!(event = name, status = %response.status(), "Collector rejected event")
        }
        Err(e) => warn!(event = name, error = %e, "Collector unreachable"),
    }
}

#[async_trait]
impl EventSink for HttpSink {
    async fn publish(&self, event: LogEvent) {
        match self.queue.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = event.name(), "Collector backlog full; event dropped")
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event = event.name(), "Collector task gone; event dropped")
            }
        }
    }
}
