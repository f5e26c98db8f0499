use serde::{Deserialize, Serialize};

const PLACEHOLDER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    User,
    Assistant,
    System,
}

/// One line of the chat log. Persisted as `{type, text}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub text: String,
}

/// The rendered conversation, in display order.
///
/// A user turn opens with a placeholder when speech starts and is filled in
/// once the transcription completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    open_user_turn: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a transcript from persisted entries.
    pub fn from_history(history: Vec<TranscriptEntry>) -> Self {
        Self {
            entries: history,
            open_user_turn: None,
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>) -> &TranscriptEntry {
        self.entries.push(TranscriptEntry {
            kind,
            text: text.into(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn begin_user_turn(&mut self) {
        self.entries.push(TranscriptEntry {
            kind: EntryKind::User,
            text: PLACEHOLDER.to_string(),
        });
        self.open_user_turn = Some(self.entries.len() - 1);
    }

    /// Fills the open user turn with `text`, appending to it if it already
    /// holds earlier text. Without an open turn a new user entry is added.
    pub fn complete_user_turn(&mut self, text: &str) -> &TranscriptEntry {
        let index = match self.open_user_turn {
            Some(index) => {
                let entry = &mut self.entries[index];
                if entry.text == PLACEHOLDER {
                    entry.text = text.to_string();
                } else {
                    entry.text.push(' ');
                    entry.text.push_str(text);
                }
                index
            }
            None => {
                self.entries.push(TranscriptEntry {
                    kind: EntryKind::User,
                    text: text.to_string(),
                });
                self.entries.len() - 1
            }
        };
        &self.entries[index]
    }

    /// User and assistant entries, as written to durable storage. A user
    /// turn still waiting for its transcription is left out.
    pub fn history(&self) -> Vec<TranscriptEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind != EntryKind::System)
            .filter(|e| !(e.kind == EntryKind::User && e.text == PLACEHOLDER))
            .cloned()
            .collect()
    }
}
