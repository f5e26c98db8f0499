//! Events published to the external log collector.

use crate::state::SessionSummary;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// What the conversation is doing right now, driven by inbound events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    UserSpeaking,
    AiSpeaking,
    Processing,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Activity::Idle => "idle",
            Activity::UserSpeaking => "user_speaking",
            Activity::AiSpeaking => "ai_speaking",
            Activity::Processing => "processing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    StateChange {
        state: Activity,
    },
    ConversationUpdate {
        role: Speaker,
        message: String,
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_item: Option<String>,
    },
    SessionSummary {
        summary: Box<SessionSummary>,
    },
}

impl LogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LogEvent::StateChange { .. } => "state_change",
            LogEvent::ConversationUpdate { .. } => "conversation_update",
            LogEvent::SessionSummary { .. } => "session_summary",
        }
    }
}

/// Destination for [`LogEvent`]s. Publishing is best effort; sinks report
/// their own failures.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: LogEvent);
}

/// Writes events to the `tracing` output. Used when no collector is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn publish(&self, event: LogEvent) {
        match &event {
            LogEvent::StateChange { state } => {
                info!(event = event.name(), %state, "Activity changed")
            }
            LogEvent::ConversationUpdate { role, session_id, .. } => {
                info!(event = event.name(), ?role, session_id = %session_id, "Conversation updated")
            }
            LogEvent::SessionSummary { summary } => {
                info!(
                    event = event.name(),
                    session_id = %summary.session_id,
                    total_answered = summary.total_answered,
                    "Session summary produced"
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_event_wire_shape() {
        let event = LogEvent::ConversationUpdate {
            role: Speaker::User,
            message: "I study physics".into(),
            session_id: "career_1_abc".into(),
            current_item: Some("academic_status".into()),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "conversation_update",
                "role": "user",
                "message": "I study physics",
                "session_id": "career_1_abc",
                "current_item": "academic_status"
            })
        );

        let change = LogEvent::StateChange {
            state: Activity::AiSpeaking,
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"event": "state_change", "state": "ai_speaking"})
        );
        assert_eq!(Activity::UserSpeaking.to_string(), "user_speaking");
    }
}
