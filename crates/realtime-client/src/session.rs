//! Session Driver
//!
//! Owns the conversation state for one live connection and runs the event
//! loop: the configuration push on open, inbound speech and transcript
//! events, tool invocations through the registry, and teardown.

use crate::channel::{ChannelEvent, ControlChannel, SessionLink};
use realtime_types::{ClientEvent, Item, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use voicedesk_core::{
    Activity, ConversationState, EntryKind, EventSink, LogEvent, PersonaDescriptor,
    SessionEffect, Speaker, StateStore, ToolContext, ToolRegistry, Transcript, TranscriptEntry,
    prompt::{render_instructions, resume_context},
};

/// Requests from the front end while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    /// A typed user turn.
    UserText(String),
    /// Pause: save progress and disconnect.
    Stop,
    Logout,
}

/// Why [`SessionDriver::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Stopped by the user or a stop tool; the state is resumable.
    Paused,
    /// A logout was requested. `cleared` tells whether saved progress was
    /// dropped.
    LoggedOut { cleared: bool },
    /// The transport went away.
    Closed,
}

/// Front-end hooks. All methods default to doing nothing.
pub trait SessionObserver: Send + Sync {
    fn on_transcript(&self, _entry: &TranscriptEntry) {}
    fn on_activity(&self, _activity: Activity) {}
    fn on_error(&self, _message: &str) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Voice used when the persona does not pick one.
    pub fallback_voice: String,
    /// Ask for text-only responses (headless transports).
    pub text_only: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            fallback_voice: crate::credential::DEFAULT_VOICE.to_string(),
            text_only: false,
        }
    }
}

pub struct SessionDriver {
    persona: PersonaDescriptor,
    registry: ToolRegistry,
    state: ConversationState,
    transcript: Transcript,
    store: StateStore,
    sink: Arc<dyn EventSink>,
    observer: Arc<dyn SessionObserver>,
    options: DriverOptions,
    activity: Activity,
    configured: bool,
}

impl SessionDriver {
    pub fn new(
        persona: PersonaDescriptor,
        state: ConversationState,
        transcript: Transcript,
        store: StateStore,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry: ToolRegistry::for_persona(&persona),
            persona,
            state,
            transcript,
            store,
            sink,
            observer: Arc::new(NoopObserver),
            options: DriverOptions::default(),
            activity: Activity::Idle,
            configured: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn persona(&self) -> &PersonaDescriptor {
        &self.persona
    }

    /// Runs until a terminal tool, a front-end stop/logout, or the transport
    /// closing. The transport is always closed before returning.
    pub async fn run(
        &mut self,
        link: SessionLink,
        commands: mpsc::Receiver<DriverCommand>,
    ) -> SessionEnd {
        let span = info_span!(
            "persona_session",
            persona = %self.persona.kind,
            session_id = %self.state.session_id
        );
        self.run_loop(link, commands).instrument(span).await
    }

    async fn run_loop(
        &mut self,
        link: SessionLink,
        mut commands: mpsc::Receiver<DriverCommand>,
    ) -> SessionEnd {
        let SessionLink {
            channel,
            mut events,
            transport,
        } = link;
        info!("Session started");

        let end = loop {
            tokio::select! {
                biased;
                event = events.recv() => {
                    match event {
                        Some(ChannelEvent::Open) => self.on_open(&channel).await,
                        Some(ChannelEvent::Message(text)) => {
                            if let Some(end) = self.on_message(&channel, &text).await {
                                break end;
                            }
                        }
                        Some(ChannelEvent::Error(message)) => {
                            error!(error = %message, "Channel error");
                            self.observer.on_error(&format!("Connection error: {}", message));
                        }
                        Some(ChannelEvent::Closed) | None => {
                            info!("Channel closed");
                            break SessionEnd::Closed;
                        }
                    }
                }
                Some(command) = commands.recv() => {
                    if let Some(end) = self.on_command(&channel, command).await {
                        break end;
                    }
                }
            }
        };

        transport.close().await;
        self.set_activity(Activity::Idle).await;
        if end == SessionEnd::Paused && !self.persona.items.is_empty() {
            let progress = self.state.progress(&self.persona.items);
            self.notice(format!(
                "Session paused. Completed {} out of {} items ({}%). You can resume later.",
                progress.completed, progress.total, progress.percentage
            ));
        }
        info!(?end, "Session finished");
        end
    }

    /// Configuration first, then the resume context if any, then the
    /// generation trigger.
    async fn on_open(&mut self, channel: &ControlChannel) {
        if self.configured {
            debug!("Channel reopened; configuration already sent");
            return;
        }
        self.configured = true;
        info!("Channel open; sending session configuration");

        let instructions = render_instructions(&self.persona, &self.state);
        let tools = self.registry.definitions(&self.persona);
        let mut config =
            self.persona
                .session_config(instructions, tools, &self.options.fallback_voice);
        if self.options.text_only {
            config.modalities = vec!["text".to_string()];
        }
        channel.send(&ClientEvent::session_update(config)).await;

        if self.state.resuming {
            let context = resume_context(&self.persona, &self.state);
            channel.send(&ClientEvent::item(Item::system_text(context))).await;
            self.state.resuming = false;
            info!(completed = self.state.completed().len(), "Resume context sent");
        }

        channel.send(&ClientEvent::ResponseCreate).await;
        self.notice("Connected! The conversation will start now.");
    }

    async fn on_message(&mut self, channel: &ControlChannel, text: &str) -> Option<SessionEnd> {
        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Unparsable inbound message");
                return None;
            }
        };

        match event {
            ServerEvent::SpeechStarted => {
                self.transcript.begin_user_turn();
                self.set_activity(Activity::UserSpeaking).await;
            }
            ServerEvent::SpeechStopped => self.set_activity(Activity::Processing).await,
            ServerEvent::AudioDelta => self.set_activity(Activity::AiSpeaking).await,
            ServerEvent::TranscriptCompleted { transcript } => {
                let text = transcript.trim();
                if !text.is_empty() {
                    let entry = self.transcript.complete_user_turn(text).clone();
                    self.observer.on_transcript(&entry);
                    self.publish_turn(Speaker::User, entry.text).await;
                }
            }
            ServerEvent::ResponseDone { response } => {
                if let Some(text) = response.transcript() {
                    let text = text.to_string();
                    self.say(text.clone());
                    self.publish_turn(Speaker::Assistant, text).await;
                }
                self.set_activity(Activity::Idle).await;
            }
            ServerEvent::FunctionCallArgumentsDone {
                name,
                call_id,
                arguments,
            } => return self.on_tool_call(channel, &name, &call_id, &arguments).await,
            ServerEvent::Error { error } => {
                error!(error = %error.message, code = ?error.code, "Remote error");
                self.observer.on_error(&error.message);
            }
            ServerEvent::Unknown => debug!("Unhandled inbound event"),
        }
        None
    }

    /// Dispatches, replies with the result and the generation trigger, then
    /// carries out the handler's effects.
    async fn on_tool_call(
        &mut self,
        channel: &ControlChannel,
        name: &str,
        call_id: &str,
        arguments: &str,
    ) -> Option<SessionEnd> {
        self.set_activity(Activity::Processing).await;
        let (result, effects) = {
            let mut ctx = ToolContext::new(&mut self.state, &self.persona);
            let result = self.registry.dispatch(&mut ctx, name, arguments);
            (result, ctx.into_effects())
        };
        debug!(tool = %name, call_id = %call_id, %result, "Tool result");

        channel
            .send(&ClientEvent::tool_output(call_id, result.to_string()))
            .await;
        channel.send(&ClientEvent::ResponseCreate).await;

        let mut end = None;
        for effect in effects {
            match effect {
                SessionEffect::Persist => self.persist(),
                SessionEffect::ClearSaved => {
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "Failed to clear saved session");
                    }
                }
                SessionEffect::SaveSummary(summary) => {
                    if let Err(e) = self.store.save_summary(&summary) {
                        warn!(error = %e, "Failed to save session summary");
                    }
                }
                SessionEffect::Notice(text) => self.notice(text),
                SessionEffect::Say(text) => self.say(text),
                SessionEffect::Publish(event) => self.sink.publish(event).await,
                SessionEffect::Pause => end = Some(SessionEnd::Paused),
                SessionEffect::Logout { clear } => end = Some(SessionEnd::LoggedOut { cleared: clear }),
            }
        }
        end
    }

    async fn on_command(
        &mut self,
        channel: &ControlChannel,
        command: DriverCommand,
    ) -> Option<SessionEnd> {
        match command {
            DriverCommand::UserText(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                if !self.configured {
                    debug!("Channel not configured yet; user text dropped");
                    return None;
                }
                let entry = self.transcript.push(EntryKind::User, text.as_str()).clone();
                self.observer.on_transcript(&entry);
                channel.send(&ClientEvent::item(Item::user_text(text.as_str()))).await;
                channel.send(&ClientEvent::ResponseCreate).await;
                self.publish_turn(Speaker::User, text).await;
                None
            }
            DriverCommand::Stop => {
                self.state.paused = true;
                self.persist();
                Some(SessionEnd::Paused)
            }
            DriverCommand::Logout => {
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear saved session");
                }
                Some(SessionEnd::LoggedOut { cleared: true })
            }
        }
    }

    /// Writes state and transcript. Failures leave the in-memory state as the
    /// only copy until the next successful write.
    fn persist(&self) {
        if self.state.concluded {
            debug!("Session concluded; not persisting");
            return;
        }
        if let Err(e) = self.store.persist(&self.state, &self.transcript) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn notice(&mut self, text: impl Into<String>) {
        let entry = self.transcript.push(EntryKind::System, text).clone();
        self.observer.on_transcript(&entry);
    }

    fn say(&mut self, text: impl Into<String>) {
        let entry = self.transcript.push(EntryKind::Assistant, text).clone();
        self.observer.on_transcript(&entry);
    }

    async fn publish_turn(&self, role: Speaker, message: String) {
        self.sink
            .publish(LogEvent::ConversationUpdate {
                role,
                message,
                session_id: self.state.session_id.clone(),
                current_item: self.state.current_item.clone(),
            })
            .await;
    }

    async fn set_activity(&mut self, activity: Activity) {
        if self.activity == activity {
            return;
        }
        self.activity = activity;
        self.observer.on_activity(activity);
        self.sink.publish(LogEvent::StateChange { state: activity }).await;
    }
}
