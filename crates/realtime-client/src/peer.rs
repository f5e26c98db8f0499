//! Peer connection and local media seams.
//!
//! The negotiator only drives these traits in the order the vendor handshake
//! requires. `microphone::MicrophoneSource` implements [`MediaSource`] when
//! the `microphone` feature is on; peer connections come from the embedding
//! platform's WebRTC stack.

use crate::{
    channel::{ChannelEvent, DataChannel},
    error::Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub const STUN_SERVER: &str = "stun:stun.l.google.com:19302";
pub const CONTROL_CHANNEL_LABEL: &str = "realtime-channel";

/// Capture settings for the single local audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
    pub channel_count: u16,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 48_000,
            channel_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub ice_servers: Vec<IceServer>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer {
                urls: vec![STUN_SERVER.to_string()],
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// The inbound media track announced by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: String,
}

pub type RemoteTrackHandler = Box<dyn Fn(RemoteTrack) + Send + Sync>;

pub trait LocalTrack: Send + Sync {
    fn id(&self) -> &str;
    /// Releases the capture device. Must be idempotent.
    fn stop(&self);
    fn is_live(&self) -> bool;
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire_audio(&self, constraints: &MediaConstraints) -> Result<Arc<dyn LocalTrack>>;
}

/// A data channel plus the stream of its inbound events.
pub struct OpenedChannel {
    pub channel: Arc<dyn DataChannel>,
    pub events: mpsc::Receiver<ChannelEvent>,
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: Arc<dyn LocalTrack>) -> Result<()>;
    async fn create_data_channel(&self, label: &str) -> Result<OpenedChannel>;
    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;
    fn on_remote_track(&self, handler: RemoteTrackHandler);
    async fn close(&self);
    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, config: &PeerConfig) -> Result<Arc<dyn PeerConnection>>;
}

/// Holds the local track and stops it when released or dropped, so every
/// exit path gives the device back.
pub struct ScopedTrack {
    track: Arc<dyn LocalTrack>,
}

impl ScopedTrack {
    pub fn new(track: Arc<dyn LocalTrack>) -> Self {
        Self { track }
    }

    pub fn track(&self) -> Arc<dyn LocalTrack> {
        self.track.clone()
    }

    pub fn release(&self) {
        if self.track.is_live() {
            debug!(track = self.track.id(), "Stopping local track");
            self.track.stop();
        }
    }
}

impl Drop for ScopedTrack {
    fn drop(&mut self) {
        self.release();
    }
}
