//! Wire format for the realtime Control Channel.
//!
//! Every message on the channel is a JSON object with a `type` discriminator.
//! Outbound messages (client to server) live in [`client`], inbound ones
//! (server to client) in [`server`]. Session configuration and conversation
//! items are shared by both directions.

pub mod client;
pub mod item;
pub mod server;
pub mod session;

pub use client::ClientEvent;
pub use item::{ContentPart, Item, ItemRole};
pub use server::{ErrorDetail, ServerEvent};
pub use session::{
    AudioTranscription, NoiseReduction, SessionConfig, ToolDefinition, TurnDetection,
};
