use crate::{item::Item, session::SessionConfig};
use serde::{Deserialize, Serialize};

/// Messages sent from the client to the realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Pushes instructions, tools and audio settings. Must be the first
    /// message after the channel opens.
    #[serde(rename = "session.update")]
    SessionUpdate { session: Box<SessionConfig> },
    /// Adds an item to the conversation: resumption context, a user text turn
    /// or a tool result.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: Item },
    /// Asks the server to generate its next turn.
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn session_update(config: SessionConfig) -> Self {
        ClientEvent::SessionUpdate {
            session: Box::new(config),
        }
    }

    pub fn item(item: Item) -> Self {
        ClientEvent::ConversationItemCreate { item }
    }

    /// Wraps a serialized tool result for the given correlation id.
    pub fn tool_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: Item::FunctionCallOutput {
                call_id: call_id.into(),
                output: output.into(),
            },
        }
    }

    pub const fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_output_wire_shape() {
        let event = ClientEvent::tool_output("call_1", r#"{"success":true}"#);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "call_1",
                    "output": "{\"success\":true}"
                }
            })
        );
    }

    #[test]
    fn test_response_create_has_only_type() {
        let text = serde_json::to_string(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(text, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_system_context_item() {
        let event = ClientEvent::item(Item::system_text("resumed"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["item"]["type"], "message");
        assert_eq!(value["item"]["role"], "system");
        assert_eq!(value["item"]["content"][0]["type"], "input_text");
        assert_eq!(value["item"]["content"][0]["text"], "resumed");
    }
}
