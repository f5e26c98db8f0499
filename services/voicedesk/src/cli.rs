use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use voicedesk_core::PersonaKind;

#[derive(Debug, Parser)]
#[command(name = "voicedesk", version, about = "Talk to a realtime voice persona from the terminal")]
pub struct Cli {
    /// Persona to talk to: career, assistant or portfolio.
    #[arg(long, global = true)]
    pub persona: Option<PersonaKind>,

    /// Resume a saved session without asking.
    #[arg(long, conflicts_with = "fresh")]
    pub resume: bool,

    /// Discard any saved session and start over.
    #[arg(long)]
    pub fresh: bool,

    /// Name recorded with the login marker.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start a conversation (the default).
    Run,
    /// Show saved progress for the persona.
    Status,
    /// Clear the saved session and sign out.
    Logout,
    /// Remove every saved session and the login marker.
    Purge,
    /// Listen on the default microphone briefly and report the input level.
    Mic,
}

/// How a saved session should be handled at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    Ask,
    Resume,
    Fresh,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    pub fn resume_choice(&self) -> ResumeChoice {
        if self.fresh {
            ResumeChoice::Fresh
        } else if self.resume {
            ResumeChoice::Resume
        } else {
            ResumeChoice::Ask
        }
    }

    /// Command-line flags win over the environment.
    pub fn apply(&self, config: &mut Config) {
        if let Some(persona) = self.persona {
            config.persona = persona;
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run_and_ask() {
        let cli = Cli::try_parse_from(["voicedesk"]).unwrap();
        assert_eq!(cli.command(), Command::Run);
        assert_eq!(cli.resume_choice(), ResumeChoice::Ask);
        assert!(cli.persona.is_none());
    }

    #[test]
    fn test_parses_flags_and_subcommand() {
        let cli = Cli::try_parse_from([
            "voicedesk",
            "--persona",
            "portfolio",
            "--name",
            "Asha",
            "status",
            "--state-dir",
            "/tmp/vd",
        ])
        .unwrap();
        assert_eq!(cli.command(), Command::Status);
        assert_eq!(cli.persona, Some(PersonaKind::Portfolio));
        assert_eq!(cli.name.as_deref(), Some("Asha"));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/vd")));
    }

    #[test]
    fn test_resume_and_fresh_conflict() {
        assert!(Cli::try_parse_from(["voicedesk", "--resume", "--fresh"]).is_err());
        let cli = Cli::try_parse_from(["voicedesk", "--fresh"]).unwrap();
        assert_eq!(cli.resume_choice(), ResumeChoice::Fresh);
    }

    #[test]
    fn test_parses_microphone_check() {
        let cli = Cli::try_parse_from(["voicedesk", "mic"]).unwrap();
        assert_eq!(cli.command(), Command::Mic);
    }

    #[test]
    fn test_unknown_persona_is_rejected() {
        assert!(Cli::try_parse_from(["voicedesk", "--persona", "pirate"]).is_err());
    }
}
