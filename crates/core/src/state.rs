//! Conversation State
//!
//! The mutable record of a single conversation: which items have been
//! answered, what was said, the detected language and free-form history.
//! Tool handlers are the only writers; the session driver owns the value and
//! passes it to them by mutable reference.

use crate::persona::ItemPlan;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Conversation language as classified by the remote party.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hinglish,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hinglish => "hinglish",
        }
    }
}

/// A recorded answer to one conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub response: String,
    /// Emotion or category tag supplied alongside the answer.
    #[serde(default)]
    pub tag: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A free-form history note (portfolio queries, interview requests, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub kind: String,
    #[serde(default)]
    pub detail: Value,
}

/// Core state of one conversation.
///
/// An item id is in `completed` if and only if it has an entry in `answers`.
/// Both collections are private so that [`ConversationState::record_answer`]
/// is the only way to grow them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    #[serde(default)]
    pub participant_name: Option<String>,
    #[serde(default)]
    completed: Vec<String>,
    #[serde(default)]
    answers: BTreeMap<String, Answer>,
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub previous_language: Language,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Set when the state was rehydrated from storage and the remote party
    /// still has to be told about prior progress.
    #[serde(default)]
    pub resuming: bool,
    #[serde(default)]
    pub paused: bool,
    /// Set once a summary has been produced; the active record is gone and
    /// must not be written again.
    #[serde(default)]
    pub concluded: bool,
}

/// Result of asking which item comes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextItem {
    Ask {
        item: String,
        remaining: usize,
        optional: bool,
    },
    Complete {
        total_answered: usize,
    },
}

/// Result of the completion threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub is_complete: bool,
    pub responses_count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
    pub required_remaining: usize,
    pub optional_remaining: usize,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

impl ConversationState {
    /// Creates an empty state with a fresh session id under `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self {
            session_id: generate_session_id(prefix),
            participant_name: None,
            completed: Vec::new(),
            answers: BTreeMap::new(),
            current_item: None,
            language: Language::default(),
            previous_language: Language::default(),
            history: Vec::new(),
            resuming: false,
            paused: false,
            concluded: false,
        }
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn answer(&self, item: &str) -> Option<&Answer> {
        self.answers.get(item)
    }

    pub fn is_completed(&self, item: &str) -> bool {
        self.answers.contains_key(item)
    }

    /// Records an answer and marks the item completed.
    ///
    /// Re-recording an item replaces its answer without duplicating it in the
    /// completed set. Returns the completed count afterwards.
    pub fn record_answer(
        &mut self,
        item: &str,
        response: impl Into<String>,
        tag: Option<String>,
        at: DateTime<Utc>,
    ) -> usize {
        let answer = Answer {
            response: response.into(),
            tag,
            recorded_at: at,
        };
        if self.answers.insert(item.to_string(), answer).is_none() {
            self.completed.push(item.to_string());
        }
        self.completed.len()
    }

    /// First required item not yet answered, then (unless skipped) the first
    /// optional one. Pure: calling it twice without a new answer gives the
    /// same result.
    pub fn next_item(&self, plan: &ItemPlan, skip_optional: bool) -> NextItem {
        let unanswered_required: Vec<&String> = plan
            .required
            .iter()
            .filter(|id| !self.is_completed(id))
            .collect();
        if let Some(first) = unanswered_required.first() {
            return NextItem::Ask {
                item: (*first).clone(),
                remaining: unanswered_required.len(),
                optional: false,
            };
        }

        if !skip_optional {
            let unanswered_optional: Vec<&String> = plan
                .optional
                .iter()
                .filter(|id| !self.is_completed(id))
                .collect();
            if let Some(first) = unanswered_optional.first() {
                return NextItem::Ask {
                    item: (*first).clone(),
                    remaining: unanswered_optional.len(),
                    optional: true,
                };
            }
        }

        NextItem::Complete {
            total_answered: self.completed.len(),
        }
    }

    /// Threshold test: at least `plan.min_answers` answers and every core
    /// item present.
    pub fn completion(&self, plan: &ItemPlan) -> Completion {
        let responses_count = self.completed.len();
        let has_minimum = responses_count >= plan.min_answers;
        let has_core = plan.core.iter().all(|id| self.is_completed(id));
        let required_answered = plan
            .required
            .iter()
            .filter(|id| self.is_completed(id))
            .count();
        Completion {
            is_complete: has_minimum && has_core,
            responses_count,
            percentage: percent(required_answered, plan.required.len()),
        }
    }

    pub fn progress(&self, plan: &ItemPlan) -> Progress {
        let total = plan.required.len() + plan.optional.len();
        let completed = self.completed.len();
        Progress {
            completed,
            total,
            percentage: percent(completed, total),
            required_remaining: plan
                .required
                .iter()
                .filter(|id| !self.is_completed(id))
                .count(),
            optional_remaining: plan
                .optional
                .iter()
                .filter(|id| !self.is_completed(id))
                .count(),
        }
    }

    /// Records a language classification, shifting the old value to
    /// `previous_language`.
    pub fn set_language(&mut self, language: Language) {
        self.previous_language = self.language;
        self.language = language;
    }

    pub fn push_history(&mut self, kind: impl Into<String>, detail: Value) {
        self.history.push(HistoryEntry {
            at: Utc::now(),
            kind: kind.into(),
            detail,
        });
    }

    /// Replaces every field with the stored record and flags the session as
    /// a resumption.
    pub fn resume_from(&mut self, stored: ConversationState) {
        *self = stored;
        self.resuming = true;
        self.paused = false;
        self.concluded = false;
    }

    /// True when there is anything worth offering to resume.
    pub fn has_progress(&self) -> bool {
        !self.completed.is_empty() || !self.history.is_empty()
    }
}

/// `<prefix>_<unix millis>_<9 random chars>`
pub fn generate_session_id(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        &random[..9]
    )
}

/// A durable artifact produced when a conversation is summarized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub participant_name: Option<String>,
    pub total_answered: usize,
    #[serde(default)]
    pub session_data: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub raw_responses: BTreeMap<String, Answer>,
}
