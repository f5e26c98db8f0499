#![allow(dead_code)]

use async_trait::async_trait;
use realtime_client::{
    ChannelEvent, ControlChannel, DataChannel, RealtimeError, SessionLink, Transport,
    peer::{
        LocalTrack, MediaConstraints, MediaSource, OpenedChannel, PeerConfig, PeerConnection,
        PeerConnectionFactory, RemoteTrack, RemoteTrackHandler, SdpKind, SessionDescription,
    },
};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;
use voicedesk_core::{EventSink, LogEvent};

/// Data channel that records everything sent through it.
pub struct FakeChannel {
    pub open: AtomicBool,
    pub sent: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap().to_string())
            .collect()
    }
}

#[async_trait]
impl DataChannel for FakeChannel {
    fn label(&self) -> &str {
        "realtime-channel"
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> Result<(), RealtimeError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

pub struct FakeTransport {
    pub channel: Arc<FakeChannel>,
    pub closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn close(&self) {
        self.channel.close().await;
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// A link whose inbound events are queued up front.
pub struct ScriptedLink {
    pub channel: Arc<FakeChannel>,
    pub closed: Arc<AtomicBool>,
    pub events: mpsc::Sender<ChannelEvent>,
}

pub fn scripted_link(script: Vec<ChannelEvent>) -> (SessionLink, ScriptedLink) {
    let channel = FakeChannel::new();
    let closed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel(64);
    for event in script {
        tx.try_send(event).unwrap();
    }
    let link = SessionLink {
        channel: ControlChannel::new(channel.clone()),
        events: rx,
        transport: Box::new(FakeTransport {
            channel: channel.clone(),
            closed: closed.clone(),
        }),
    };
    (
        link,
        ScriptedLink {
            channel,
            closed,
            events: tx,
        },
    )
}

pub fn tool_call(name: &str, call_id: &str, arguments: Value) -> ChannelEvent {
    ChannelEvent::Message(
        serde_json::json!({
            "type": "response.function_call_arguments.done",
            "name": name,
            "call_id": call_id,
            "arguments": arguments.to_string(),
        })
        .to_string(),
    )
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<LogEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FakeTrack {
    pub live: AtomicBool,
}

impl LocalTrack for FakeTrack {
    fn id(&self) -> &str {
        "mic-0"
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeMedia {
    pub deny: bool,
    pub track: Arc<FakeTrack>,
    pub requested: Mutex<Option<MediaConstraints>>,
}

impl FakeMedia {
    pub fn new(deny: bool) -> Arc<Self> {
        Arc::new(Self {
            deny,
            track: Arc::new(FakeTrack {
                live: AtomicBool::new(true),
            }),
            requested: Mutex::new(None),
        })
    }
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn acquire_audio(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Arc<dyn LocalTrack>, RealtimeError> {
        *self.requested.lock().unwrap() = Some(*constraints);
        if self.deny {
            return Err(RealtimeError::MediaAccess("permission denied".into()));
        }
        Ok(self.track.clone())
    }
}

/// Peer connection that logs each call in order.
pub struct FakePeer {
    pub calls: Mutex<Vec<String>>,
    pub closed: AtomicBool,
    pub remote_track: Mutex<Option<RemoteTrackHandler>>,
    pub channel: Arc<FakeChannel>,
}

impl FakePeer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deliver_remote_track(&self) {
        if let Some(handler) = self.remote_track.lock().unwrap().as_ref() {
            handler(RemoteTrack {
                id: "remote-audio".into(),
                kind: "audio".into(),
            });
        }
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> Result<(), RealtimeError> {
        self.calls.lock().unwrap().push(format!("add_track:{}", track.id()));
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<OpenedChannel, RealtimeError> {
        self.calls.lock().unwrap().push(format!("data_channel:{}", label));
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(ChannelEvent::Open).unwrap();
        Ok(OpenedChannel {
            channel: self.channel.clone(),
            events: rx,
        })
    }

    async fn create_offer(&self) -> Result<SessionDescription, RealtimeError> {
        self.calls.lock().unwrap().push("create_offer".into());
        Ok(SessionDescription {
            kind: SdpKind::Offer,
            sdp: "v=0 offer".into(),
        })
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), RealtimeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_local:{}", description.sdp));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), RealtimeError> {
        assert_eq!(description.kind, SdpKind::Answer);
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_remote:{}", description.sdp));
        Ok(())
    }

    fn on_remote_track(&self, handler: RemoteTrackHandler) {
        *self.remote_track.lock().unwrap() = Some(handler);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakePeerFactory {
    pub peer: Arc<FakePeer>,
    pub configs: Mutex<Vec<PeerConfig>>,
}

impl FakePeerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peer: Arc::new(FakePeer {
                calls: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                remote_track: Mutex::new(None),
                channel: FakeChannel::new(),
            }),
            configs: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(&self, config: &PeerConfig) -> Result<Arc<dyn PeerConnection>, RealtimeError> {
        self.configs.lock().unwrap().push(config.clone());
        Ok(self.peer.clone())
    }
}
