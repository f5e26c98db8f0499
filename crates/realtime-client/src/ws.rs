//! Control Channel over the vendor WebSocket endpoint.
//!
//! Carries the same JSON events as the WebRTC data channel, without media,
//! so the session driver can run headless.

use crate::{
    channel::{ChannelEvent, ControlChannel, DataChannel, SessionLink, Transport},
    credential::ConnectionSettings,
    error::{RealtimeError, Result},
};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use secrecy::ExposeSecret;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        client::IntoClientRequest, http::HeaderValue, protocol::Message as WsMessage,
    },
};
use tracing::{debug, error, info, instrument};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

const EVENT_BUFFER: usize = 64;

pub struct WebSocketChannel {
    sink: Mutex<WsSink>,
    open: Arc<AtomicBool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Opens the WebSocket and returns a link ready for the session driver.
/// `ChannelEvent::Open` is the first event delivered.
#[instrument(name = "ws_connect", skip_all, fields(deployment = %settings.deployment))]
pub async fn connect(settings: &ConnectionSettings) -> Result<SessionLink> {
    let mut request = settings.websocket_endpoint().into_client_request()?;
    let (header, value) = settings.auth.header(settings.api_key.expose_secret());
    let value = HeaderValue::from_str(&value)
        .map_err(|_| RealtimeError::Credential("API key is not a valid header value".to_string()))?;
    request.headers_mut().insert(header, value);
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    let (stream, _) = connect_async(request).await?;
    let (sink, mut source) = stream.split();
    info!("Connected to realtime WebSocket");

    let open = Arc::new(AtomicBool::new(true));
    let (tx, events) = mpsc::channel(EVENT_BUFFER);
    let _ = tx.try_send(ChannelEvent::Open);

    let reader_open = open.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let event = match frame {
                Ok(WsMessage::Text(text)) => ChannelEvent::Message(text.to_string()),
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by peer");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "WebSocket read failed");
                    let _ = tx.send(ChannelEvent::Error(e.to_string())).await;
                    break;
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
        reader_open.store(false, Ordering::SeqCst);
        let _ = tx.send(ChannelEvent::Closed).await;
    });

    let channel = Arc::new(WebSocketChannel {
        sink: Mutex::new(sink),
        open,
        reader: std::sync::Mutex::new(Some(reader)),
    });
    Ok(SessionLink {
        channel: ControlChannel::new(channel.clone()),
        events,
        transport: Box::new(WebSocketTransport { channel }),
    })
}

#[async_trait]
impl DataChannel for WebSocketChannel {
    fn label(&self) -> &str {
        "websocket"
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(WsMessage::Close(None)).await {
            debug!(error = %e, "Close frame not sent");
        }
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

struct WebSocketTransport {
    channel: Arc<WebSocketChannel>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn close(&self) {
        self.channel.close().await;
        info!("WebSocket transport closed");
    }

    fn is_active(&self) -> bool {
        self.channel.is_open()
    }
}
