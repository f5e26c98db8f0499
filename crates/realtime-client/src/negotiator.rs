//! Session Negotiator
//!
//! Credential fetch, local audio, peer connection and the offer/answer
//! exchange, in the fixed order the vendor expects.

use crate::{
    channel::{ChannelEvent, ControlChannel, DataChannel, SessionLink, Transport},
    credential::{ConnectionSettings, EphemeralCredential, request_credential},
    error::{RealtimeError, Result},
    peer::{
        CONTROL_CHANNEL_LABEL, MediaConstraints, MediaSource, OpenedChannel, PeerConfig,
        PeerConnection, PeerConnectionFactory, RemoteTrackHandler, ScopedTrack, SessionDescription,
    },
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

pub struct Negotiator {
    http: reqwest::Client,
    settings: ConnectionSettings,
    media: Arc<dyn MediaSource>,
    peers: Arc<dyn PeerConnectionFactory>,
    constraints: MediaConstraints,
    peer_config: PeerConfig,
}

impl Negotiator {
    pub fn new(
        http: reqwest::Client,
        settings: ConnectionSettings,
        media: Arc<dyn MediaSource>,
        peers: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        Self {
            http,
            settings,
            media,
            peers,
            constraints: MediaConstraints::default(),
            peer_config: PeerConfig::default(),
        }
    }

    pub fn with_peer_config(mut self, config: PeerConfig) -> Self {
        self.peer_config = config;
        self
    }

    /// Runs the handshake. On any failure everything acquired so far is
    /// released before the error is returned.
    #[instrument(name = "negotiate", skip_all, fields(deployment = %self.settings.deployment))]
    pub async fn establish(&self) -> Result<Connection> {
        let credential = request_credential(&self.http, &self.settings).await?;

        let track = self
            .media
            .acquire_audio(&self.constraints)
            .await
            .map_err(|e| match e {
                RealtimeError::MediaAccess(_) => e,
                other => RealtimeError::MediaAccess(other.to_string()),
            })?;
        let track = ScopedTrack::new(track);

        let peer = self
            .peers
            .create(&self.peer_config)
            .await
            .map_err(|e| RealtimeError::Negotiation(format!("peer connection: {}", e)))?;

        match self.exchange(&credential, &peer, &track).await {
            Ok(opened) => {
                info!("Media path established");
                Ok(Connection {
                    peer,
                    channel: opened.channel,
                    events: opened.events,
                    track,
                    remote_session_id: credential.session_id,
                })
            }
            Err(e) => {
                warn!(error = %e, "Negotiation failed; releasing resources");
                peer.close().await;
                track.release();
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        credential: &EphemeralCredential,
        peer: &Arc<dyn PeerConnection>,
        track: &ScopedTrack,
    ) -> Result<OpenedChannel> {
        peer.add_track(track.track()).await?;
        // The channel has to exist before the offer so it is negotiated.
        let opened = peer.create_data_channel(CONTROL_CHANNEL_LABEL).await?;

        let offer = peer.create_offer().await?;
        let offer_sdp = offer.sdp.clone();
        peer.set_local_description(offer).await?;

        let response = self
            .http
            .post(self.settings.negotiation_url())
            .bearer_auth(credential.key.expose_secret())
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer_sdp)
            .send()
            .await
            .map_err(|e| RealtimeError::Negotiation(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RealtimeError::Negotiation(e.to_string()))?;
        if !status.is_success() {
            return Err(RealtimeError::Negotiation(format!(
                "WebRTC API error: {} - {}",
                status, body
            )));
        }

        peer.set_remote_description(SessionDescription::answer(body)).await?;
        Ok(opened)
    }
}

/// An established peer connection with its control channel.
pub struct Connection {
    peer: Arc<dyn PeerConnection>,
    channel: Arc<dyn DataChannel>,
    events: mpsc::Receiver<ChannelEvent>,
    track: ScopedTrack,
    remote_session_id: Option<String>,
}

impl Connection {
    pub fn control_channel(&self) -> ControlChannel {
        ControlChannel::new(self.channel.clone())
    }

    pub fn on_remote_track(&self, handler: RemoteTrackHandler) {
        self.peer.on_remote_track(handler);
    }

    pub fn remote_session_id(&self) -> Option<&str> {
        self.remote_session_id.as_deref()
    }

    pub fn into_link(self) -> SessionLink {
        let channel = self.control_channel();
        let Connection {
            peer,
            channel: raw,
            events,
            track,
            ..
        } = self;
        SessionLink {
            channel,
            events,
            transport: Box::new(PeerTransport {
                peer,
                channel: raw,
                track,
            }),
        }
    }
}

struct PeerTransport {
    peer: Arc<dyn PeerConnection>,
    channel: Arc<dyn DataChannel>,
    track: ScopedTrack,
}

#[async_trait]
impl Transport for PeerTransport {
    async fn close(&self) {
        self.channel.close().await;
        self.peer.close().await;
        self.track.release();
        info!("Connection closed");
    }

    fn is_active(&self) -> bool {
        !self.peer.is_closed() || self.track.track().is_live()
    }
}
