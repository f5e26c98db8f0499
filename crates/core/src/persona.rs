//! Persona descriptors.
//!
//! One parameterized implementation serves every voice persona: the prompt
//! template, the item plan, the tool subset and the audio settings are data
//! on a [`PersonaDescriptor`], not separate code paths.

use realtime_types::{AudioTranscription, NoiseReduction, SessionConfig, ToolDefinition, TurnDetection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const CAREER_PROMPT: &str = include_str!("../prompts/career.md");
const ASSISTANT_PROMPT: &str = include_str!("../prompts/assistant.md");
const PORTFOLIO_PROMPT: &str = include_str!("../prompts/portfolio.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaKind {
    Career,
    Assistant,
    Portfolio,
}

impl PersonaKind {
    pub const ALL: [PersonaKind; 3] = [
        PersonaKind::Career,
        PersonaKind::Assistant,
        PersonaKind::Portfolio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaKind::Career => "career",
            PersonaKind::Assistant => "assistant",
            PersonaKind::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "career" => Ok(PersonaKind::Career),
            "assistant" => Ok(PersonaKind::Assistant),
            "portfolio" => Ok(PersonaKind::Portfolio),
            other => Err(format!("unknown persona '{}'", other)),
        }
    }
}

/// Ordered conversation items and the completion policy over them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPlan {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    /// Items that must all be answered before the conversation can complete.
    pub core: Vec<String>,
    pub min_answers: usize,
}

impl ItemPlan {
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.required.iter().chain(self.optional.iter())
    }

    pub fn contains(&self, item: &str) -> bool {
        self.all().any(|id| id == item)
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// Audio and turn-taking settings pushed with the session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProfile {
    /// Fixed voice for the persona; falls back to the configured voice.
    pub voice: Option<String>,
    pub modalities: Vec<String>,
    pub audio_format: Option<String>,
    pub transcription: Option<AudioTranscription>,
    pub noise_reduction: Option<NoiseReduction>,
    pub turn_detection: TurnDetection,
    pub temperature: Option<f32>,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            voice: None,
            modalities: vec!["text".to_string(), "audio".to_string()],
            audio_format: Some("pcm16".to_string()),
            transcription: None,
            noise_reduction: None,
            turn_detection: TurnDetection::server_default(),
            temperature: None,
        }
    }
}

/// Knowledge the portfolio persona answers from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioProfile {
    pub owner: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub contact: Option<String>,
    /// Category name to answer text, e.g. `"skills"`.
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

impl PortfolioProfile {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonaDescriptor {
    pub kind: PersonaKind,
    /// Prefix of every durable storage key this persona writes.
    pub storage_prefix: &'static str,
    /// Name shown next to assistant transcript entries.
    pub label: &'static str,
    pub prompt_template: String,
    pub items: ItemPlan,
    /// Wire names of the tools this persona registers.
    pub tools: Vec<&'static str>,
    pub audio: AudioProfile,
    pub profile: Option<PortfolioProfile>,
}

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PersonaDescriptor {
    /// Structured career-counselling interview.
    pub fn career() -> Self {
        Self {
            kind: PersonaKind::Career,
            storage_prefix: "career",
            label: "Career Counselor",
            prompt_template: CAREER_PROMPT.to_string(),
            items: ItemPlan {
                required: ids(&[
                    "intro",
                    "academic_status",
                    "career_confusion",
                    "interests",
                    "skills",
                    "ai_fears",
                    "industry_preference",
                    "work_values",
                    "learning_style",
                    "obstacles",
                    "timeline",
                    "immediate_need",
                ]),
                optional: ids(&["role_models", "experience", "support"]),
                core: ids(&[
                    "intro",
                    "academic_status",
                    "career_confusion",
                    "ai_fears",
                    "immediate_need",
                ]),
                min_answers: 8,
            },
            tools: vec![
                "track_survey_response",
                "determine_next_question",
                "check_completion_status",
                "end_session_summary",
                "provide_clarification",
                "detect_emotional_state",
                "adjust_conversation_depth",
                "stop_conversation",
                "trigger_logout",
            ],
            audio: AudioProfile {
                voice: Some("ash".to_string()),
                ..AudioProfile::default()
            },
            profile: None,
        }
    }

    /// Plain conversational assistant with no tools.
    pub fn assistant() -> Self {
        Self {
            kind: PersonaKind::Assistant,
            storage_prefix: "assistant",
            label: "Assistant",
            prompt_template: ASSISTANT_PROMPT.to_string(),
            items: ItemPlan::default(),
            tools: Vec::new(),
            audio: AudioProfile {
                turn_detection: TurnDetection::SemanticVad { eagerness: None },
                ..AudioProfile::default()
            },
            profile: None,
        }
    }

    /// Portfolio bot speaking for the profile owner, bilingual.
    pub fn portfolio(profile: PortfolioProfile) -> Self {
        Self {
            kind: PersonaKind::Portfolio,
            storage_prefix: "portfolio",
            label: "Portfolio Bot",
            prompt_template: PORTFOLIO_PROMPT.to_string(),
            items: ItemPlan::default(),
            tools: vec![
                "detect_user_language",
                "provide_portfolio_details",
                "schedule_interview",
                "stop_conversation",
                "exit_session",
            ],
            audio: AudioProfile {
                voice: Some("ash".to_string()),
                transcription: Some(AudioTranscription {
                    model: "gpt-4o-transcribe".to_string(),
                    prompt: Some("Two languages: Hindi and English".to_string()),
                }),
                noise_reduction: Some(NoiseReduction {
                    kind: "far_field".to_string(),
                }),
                turn_detection: TurnDetection::ServerVad {
                    threshold: Some(0.4),
                    prefix_padding_ms: Some(300),
                    silence_duration_ms: Some(600),
                },
                temperature: Some(0.7),
                ..AudioProfile::default()
            },
            profile: Some(profile),
        }
    }

    pub fn for_kind(kind: PersonaKind, profile: Option<PortfolioProfile>) -> Self {
        match kind {
            PersonaKind::Career => Self::career(),
            PersonaKind::Assistant => Self::assistant(),
            PersonaKind::Portfolio => Self::portfolio(profile.unwrap_or_default()),
        }
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Builds the `session.update` payload for this persona.
    pub fn session_config(
        &self,
        instructions: String,
        tools: Vec<ToolDefinition>,
        fallback_voice: &str,
    ) -> SessionConfig {
        SessionConfig {
            instructions,
            modalities: self.audio.modalities.clone(),
            tools,
            voice: Some(
                self.audio
                    .voice
                    .clone()
                    .unwrap_or_else(|| fallback_voice.to_string()),
            ),
            input_audio_format: self.audio.audio_format.clone(),
            output_audio_format: self.audio.audio_format.clone(),
            input_audio_transcription: self.audio.transcription.clone(),
            input_audio_noise_reduction: self.audio.noise_reduction.clone(),
            turn_detection: Some(self.audio.turn_detection.clone()),
            temperature: self.audio.temperature,
        }
    }
}
