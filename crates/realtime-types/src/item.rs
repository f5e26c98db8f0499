use serde::{Deserialize, Serialize};

/// A conversation item carried by `conversation.item.create`.
///
/// The same message type delivers both injected context (a system message)
/// and tool results (a function call output), so the item is itself tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Message {
        role: ItemRole,
        content: Vec<ContentPart>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl Item {
    pub fn system_text(text: impl Into<String>) -> Self {
        Item::Message {
            role: ItemRole::System,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Item::Message {
            role: ItemRole::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}
