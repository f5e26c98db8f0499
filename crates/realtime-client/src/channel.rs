//! Control Channel
//!
//! The message-oriented channel that carries JSON control events between
//! the client and the remote party. The same contract is served by a WebRTC
//! data channel or by the vendor WebSocket.

use crate::error::Result;
use async_trait::async_trait;
use realtime_types::ClientEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Inbound notifications from a channel, delivered in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Error(String),
    Closed,
}

/// A text channel as exposed by the underlying transport.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;
    fn is_open(&self) -> bool;
    async fn send_text(&self, text: String) -> Result<()>;
    async fn close(&self);
}

/// Whatever must be torn down when the session ends.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stops local tracks, closes the channel and the connection. Idempotent.
    async fn close(&self);
    fn is_active(&self) -> bool;
}

/// Everything the session driver needs from an established connection.
pub struct SessionLink {
    pub channel: ControlChannel,
    pub events: mpsc::Receiver<ChannelEvent>,
    pub transport: Box<dyn Transport>,
}

/// Typed sender over a [`DataChannel`].
#[derive(Clone)]
pub struct ControlChannel {
    inner: Arc<dyn DataChannel>,
}

impl ControlChannel {
    pub fn new(inner: Arc<dyn DataChannel>) -> Self {
        Self { inner }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Serializes and sends `event`. Returns whether it went out; a channel
    /// that is not open drops the message.
    pub async fn send(&self, event: &ClientEvent) -> bool {
        if !self.inner.is_open() {
            debug!(event_type = event.event_type(), "Channel not open; message dropped");
            return false;
        }
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                error!(event_type = event.event_type(), error = %e, "Failed to serialize message");
                return false;
            }
        };
        match self.inner.send_text(text).await {
            Ok(()) => {
                debug!(event_type = event.event_type(), "Sent message");
                true
            }
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "Send failed; message dropped");
                false
            }
        }
    }
}
