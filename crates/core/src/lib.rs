//! Conversation core shared by every persona: the state being built up, the
//! tools the remote party calls to change it, and where it is kept between
//! sessions. Nothing here talks to the network.

pub mod events;
pub mod persona;
pub mod prompt;
pub mod state;
pub mod store;
pub mod tools;
pub mod transcript;

pub use events::{Activity, EventSink, LogEvent, Speaker, TracingSink};
pub use persona::{ItemPlan, PersonaDescriptor, PersonaKind, PortfolioProfile};
pub use state::{ConversationState, Language, NextItem, Progress, SessionSummary};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistedSession, StateStore, StoreError};
pub use tools::{SessionEffect, ToolContext, ToolError, ToolRegistry};
pub use transcript::{EntryKind, Transcript, TranscriptEntry};
