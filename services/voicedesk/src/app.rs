//! The terminal front end: start-up housekeeping on the durable store, the
//! resume decision, one live session over the WebSocket transport, and the
//! logout flow.

use crate::{cli::ResumeChoice, config::Config};
use anyhow::Context;
use realtime_client::{
    DriverCommand, DriverOptions, SessionDriver, SessionEnd, SessionObserver,
    account::{fetch_remote_settings, remote_logout},
    collector::HttpSink,
    ws,
};
use std::{path::Path, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
};
use tracing::{info, warn};
use voicedesk_core::{
    ConversationState, EntryKind, EventSink, FileStore, KeyValueStore, PersistedSession,
    PersonaDescriptor, PersonaKind, PortfolioProfile, StateStore, Transcript, TracingSink,
    TranscriptEntry,
    store::{clear_user_markers, mark_user_session, purge_stale_sessions},
};

/// Typed commands accepted on stdin besides plain text turns.
const STOP_COMMAND: &str = "/stop";
const LOGOUT_COMMAND: &str = "/logout";

/// Upper bound for collector, configuration and logout calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct App {
    config: Config,
    persona: PersonaDescriptor,
    kv: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
}

impl App {
    /// Opens the state directory and loads the configured persona.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(
            FileStore::open(&config.state_dir)
                .with_context(|| format!("Failed to open state dir {}", config.state_dir.display()))?,
        );
        let persona = load_persona(&config)?;
        Self::with_store(config, persona, kv)
    }

    pub fn with_store(
        config: Config,
        persona: PersonaDescriptor,
        kv: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            persona,
            kv,
            http,
        })
    }

    fn state_store(&self) -> StateStore {
        StateStore::new(self.kv.clone(), self.persona.storage_prefix)
    }

    /// Purges records left by an earlier login when the login marker is gone,
    /// then sets the marker. Returns how many keys were removed.
    pub fn begin_login(&self, name: Option<&str>, email: Option<&str>) -> anyhow::Result<usize> {
        let prefixes: Vec<&str> = PersonaKind::ALL.iter().map(|k| k.as_str()).collect();
        let removed = purge_stale_sessions(self.kv.as_ref(), &prefixes)?;
        mark_user_session(self.kv.as_ref(), name, email)?;
        Ok(removed)
    }

    /// The saved record, if it holds anything worth resuming.
    pub fn resumable(&self) -> anyhow::Result<Option<PersistedSession>> {
        Ok(self
            .state_store()
            .load()?
            .filter(|record| record.state.has_progress()))
    }

    /// Builds the starting state: rehydrated from `record` when given,
    /// otherwise fresh with any saved record removed.
    pub fn initial_state(
        &self,
        record: Option<PersistedSession>,
        name: Option<&str>,
    ) -> anyhow::Result<(ConversationState, Transcript)> {
        match record {
            Some(record) => {
                let mut state = ConversationState::new(self.persona.storage_prefix);
                state.resume_from(record.state);
                info!(
                    session_id = %state.session_id,
                    completed = state.completed().len(),
                    "Resuming saved session"
                );
                Ok((state, Transcript::from_history(record.chat_history)))
            }
            None => {
                self.state_store().clear()?;
                let mut state = ConversationState::new(self.persona.storage_prefix);
                state.participant_name = name.map(str::to_string);
                info!(session_id = %state.session_id, "Starting new session");
                Ok((state, Transcript::new()))
            }
        }
    }

    /// Progress report for the saved session.
    pub fn status(&self) -> anyhow::Result<String> {
        let Some(record) = self.state_store().load()? else {
            return Ok(format!("No saved {} session.", self.persona.kind));
        };
        let state = &record.state;
        let mut report = format!(
            "Saved {} session {} (last saved {})",
            self.persona.kind,
            state.session_id,
            record.timestamp.to_rfc3339()
        );
        if let Some(name) = &state.participant_name {
            report.push_str(&format!("\nParticipant: {}", name));
        }
        if !self.persona.items.is_empty() {
            let progress = state.progress(&self.persona.items);
            report.push_str(&format!(
                "\nCompleted {} out of {} items ({}%). {} required and {} optional remaining.",
                progress.completed,
                progress.total,
                progress.percentage,
                progress.required_remaining,
                progress.optional_remaining
            ));
        }
        report.push_str(&format!("\nTranscript lines: {}", record.chat_history.len()));
        Ok(report)
    }

    /// Removes saved sessions for every persona and the login marker.
    pub fn purge(&self) -> anyhow::Result<usize> {
        clear_user_markers(self.kv.as_ref())?;
        let prefixes: Vec<&str> = PersonaKind::ALL.iter().map(|k| k.as_str()).collect();
        Ok(purge_stale_sessions(self.kv.as_ref(), &prefixes)?)
    }

    /// Local logout cleanup followed by the external logout call. Returns
    /// the redirect target.
    ///
    /// Without `clear_saved` the login marker stays, so the next start does
    /// not purge the record that was kept.
    pub async fn logout(&self, clear_saved: bool) -> anyhow::Result<String> {
        if clear_saved {
            self.state_store().clear()?;
            clear_user_markers(self.kv.as_ref())?;
        }
        let redirect = remote_logout(&self.http, self.config.logout_url.as_deref())
            .await
            .context("Logout failed")?;
        info!(%redirect, "Logged out");
        Ok(redirect)
    }

    /// Runs one conversation from the terminal until it ends.
    pub async fn run(
        &self,
        choice: ResumeChoice,
        name: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<SessionEnd> {
        let removed = self.begin_login(name, email)?;
        if removed > 0 {
            println!("Cleared {} saved item(s) from an earlier login.", removed);
        }

        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let record = match (choice, self.resumable()?) {
            (ResumeChoice::Fresh, _) | (_, None) => None,
            (ResumeChoice::Resume, Some(record)) => Some(record),
            (ResumeChoice::Ask, Some(record)) => {
                if ask_resume(&self.persona, &record, &mut input).await? {
                    Some(record)
                } else {
                    None
                }
            }
        };
        let (state, transcript) = self.initial_state(record, name)?;

        let mut settings = self.config.connection_settings()?;
        if let Some(url) = &self.config.config_url {
            match fetch_remote_settings(&self.http, url).await {
                Ok(remote) => remote.apply(&mut settings),
                Err(e) => warn!(error = %e, "Using local connection settings"),
            }
        }

        let sink: Arc<dyn EventSink> = match &self.config.log_collector_url {
            Some(url) => Arc::new(HttpSink::new(self.http.clone(), url.clone())),
            None => Arc::new(TracingSink),
        };

        let link = ws::connect(&settings)
            .await
            .context("Failed to connect to the realtime service")?;

        let mut driver = SessionDriver::new(
            self.persona.clone(),
            state,
            transcript,
            self.state_store(),
            sink,
        )
        .with_observer(Arc::new(ConsoleObserver {
            assistant: self.persona.label,
        }))
        .with_options(DriverOptions {
            fallback_voice: settings.voice.clone(),
            text_only: true,
        });

        let (commands, rx) = mpsc::channel(16);
        let reader = tokio::spawn(forward_input(input, commands.clone()));
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received; pausing session");
                let _ = commands.send(DriverCommand::Stop).await;
            }
        });

        let end = driver.run(link, rx).await;
        reader.abort();
        interrupt.abort();

        if let SessionEnd::LoggedOut { cleared } = end {
            let redirect = self.logout(cleared).await?;
            println!("Signed out. Continue at {}", redirect);
        }
        Ok(end)
    }
}

/// Applies the prompt override and the portfolio profile, if configured.
fn load_persona(config: &Config) -> anyhow::Result<PersonaDescriptor> {
    let profile = match &config.portfolio_profile {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile {}", path.display()))?;
            Some(PortfolioProfile::from_json(&text).context("Invalid portfolio profile")?)
        }
        None => None,
    };
    let mut persona = PersonaDescriptor::for_kind(config.persona, profile);
    if let Some(dir) = &config.prompts_path {
        if let Some(template) = prompt_override(dir, config.persona)? {
            info!(persona = %config.persona, "Using prompt override");
            persona = persona.with_prompt_template(template);
        }
    }
    Ok(persona)
}

fn prompt_override(dir: &Path, kind: PersonaKind) -> anyhow::Result<Option<String>> {
    let path = dir.join(format!("{}.md", kind));
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read prompt {}", path.display()))?;
    Ok(Some(text))
}

async fn ask_resume(
    persona: &PersonaDescriptor,
    record: &PersistedSession,
    input: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<bool> {
    if persona.items.is_empty() {
        println!("A saved conversation was found.");
    } else {
        let progress = record.state.progress(&persona.items);
        println!(
            "A saved session was found: {} of {} items answered ({}%).",
            progress.completed, progress.total, progress.percentage
        );
    }
    println!("Resume it? [Y/n]");
    let answer = input.next_line().await?.unwrap_or_default();
    Ok(!answer.trim().eq_ignore_ascii_case("n") && !answer.trim().eq_ignore_ascii_case("no"))
}

/// Stdin lines become text turns until input ends.
async fn forward_input(mut input: Lines<BufReader<Stdin>>, commands: mpsc::Sender<DriverCommand>) {
    while let Ok(Some(line)) = input.next_line().await {
        let command = parse_input(&line);
        if commands.send(command).await.is_err() {
            break;
        }
    }
}

fn parse_input(line: &str) -> DriverCommand {
    match line.trim() {
        STOP_COMMAND => DriverCommand::Stop,
        LOGOUT_COMMAND => DriverCommand::Logout,
        text => DriverCommand::UserText(text.to_string()),
    }
}

/// Prints transcript lines to stdout.
struct ConsoleObserver {
    assistant: &'static str,
}

impl SessionObserver for ConsoleObserver {
    fn on_transcript(&self, entry: &TranscriptEntry) {
        match entry.kind {
            EntryKind::User => println!("You: {}", entry.text),
            EntryKind::Assistant => println!("{}: {}", self.assistant, entry.text),
            EntryKind::System => println!("* {}", entry.text),
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("! {}", message);
    }
}
