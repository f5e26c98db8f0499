//! Client side of a realtime voice session: negotiating the connection,
//! carrying control messages, and the event loop that ties inbound events
//! to the tool dispatcher in `voicedesk-core`.

pub mod account;
pub mod channel;
pub mod collector;
pub mod credential;
pub mod error;
pub mod microphone;
pub mod negotiator;
pub mod peer;
pub mod session;
pub mod ws;

pub use channel::{ChannelEvent, ControlChannel, DataChannel, SessionLink, Transport};
pub use credential::{ConnectionSettings, EphemeralCredential, KeyAuth};
pub use error::{RealtimeError, Result};
pub use negotiator::{Connection, Negotiator};
pub use session::{DriverCommand, DriverOptions, SessionDriver, SessionEnd, SessionObserver};
