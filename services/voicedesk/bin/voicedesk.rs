//! Main Entrypoint for the voicedesk terminal client
//!
//! This binary is responsible for:
//! 1. Parsing the command line and loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Opening the durable state directory and loading the persona.
//! 4. Running the selected command.

use anyhow::Context;
use clap::Parser;
use realtime_client::SessionEnd;
use tracing::info;
use voicedesk::{
    app::App,
    cli::{Cli, Command},
    config::Config,
};

#[cfg(feature = "microphone")]
const MIC_CHECK: std::time::Duration = std::time::Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config);

    // --- 2. Initialize Logging ---
    // Transcript lines own stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(persona = %config.persona, state_dir = %config.state_dir.display(), "Configuration loaded");

    // --- 3. Open State ---
    let app = App::new(config)?;

    // --- 4. Run Command ---
    match cli.command() {
        Command::Run => {
            let end = app
                .run(cli.resume_choice(), cli.name.as_deref(), cli.email.as_deref())
                .await?;
            if end == SessionEnd::Closed {
                println!("Connection closed.");
            }
            info!(?end, "Session ended");
        }
        Command::Status => println!("{}", app.status()?),
        Command::Logout => {
            let redirect = app.logout(true).await?;
            println!("Signed out. Continue at {}", redirect);
        }
        Command::Purge => {
            let removed = app.purge()?;
            println!("Removed {} saved item(s).", removed);
        }
        Command::Mic => check_microphone().await?,
    }
    Ok(())
}

#[cfg(feature = "microphone")]
async fn check_microphone() -> anyhow::Result<()> {
    use realtime_client::{
        microphone::{self, MicrophoneSource},
        peer::{MediaConstraints, ScopedTrack},
    };

    let track = MicrophoneSource
        .open(&MediaConstraints::default())
        .await
        .context("Could not open the microphone")?;
    let guard = ScopedTrack::new(track.clone());
    let mut frames = track
        .take_frames()
        .context("Capture buffers already taken")?;

    println!("Listening for {} seconds...", MIC_CHECK.as_secs());
    let level = microphone::measure(&mut frames, MIC_CHECK).await;
    guard.release();
    println!(
        "Received {} buffer(s), {} sample(s), peak level {:.2}.",
        level.buffers, level.samples, level.peak
    );
    Ok(())
}

#[cfg(not(feature = "microphone"))]
async fn check_microphone() -> anyhow::Result<()> {
    anyhow::bail!("voicedesk was built without microphone support; rebuild with `--features microphone`")
}
