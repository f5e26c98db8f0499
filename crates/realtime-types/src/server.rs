use serde::{Deserialize, Serialize};

/// Messages received from the realtime server.
///
/// Only the types the client reacts to are modelled; everything else
/// deserializes to [`ServerEvent::Unknown`] so new server events never break
/// the channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The server finished generating a turn.
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseBody,
    },
    /// A chunk of generated audio is streaming.
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta,
    /// Voice activity detection saw the user start speaking.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    /// Voice activity detection saw the user stop speaking.
    #[serde(
        rename = "input_audio_buffer.speech_stopped",
        alias = "input_audio_buffer.speech_ended"
    )]
    SpeechStopped,
    /// The transcription of a user turn is final.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptCompleted {
        #[serde(default)]
        transcript: String,
    },
    /// A tool invocation is complete and ready to dispatch.
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        name: String,
        call_id: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub const fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::ResponseDone { .. } => "response.done",
            ServerEvent::AudioDelta => "response.audio.delta",
            ServerEvent::SpeechStarted => "input_audio_buffer.speech_started",
            ServerEvent::SpeechStopped => "input_audio_buffer.speech_stopped",
            ServerEvent::TranscriptCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            ServerEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            ServerEvent::Error { .. } => "error",
            ServerEvent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

impl ResponseBody {
    /// What the assistant said this turn: the audio transcript, or the text
    /// for text-only responses. Function-call items carry no content and are
    /// skipped.
    pub fn transcript(&self) -> Option<&str> {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .find_map(|content| {
                content
                    .transcript
                    .as_deref()
                    .or(content.text.as_deref())
                    .filter(|t| !t.is_empty())
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_done_parses() {
        let text = r#"{
            "type": "response.function_call_arguments.done",
            "event_id": "evt_1",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "call_id": "call_9",
            "name": "track_survey_response",
            "arguments": "{\"question_id\":\"intro\",\"response\":\"Asha\"}"
        }"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        match event {
            ServerEvent::FunctionCallArgumentsDone {
                name,
                call_id,
                arguments,
            } => {
                assert_eq!(name, "track_survey_response");
                assert_eq!(call_id, "call_9");
                assert!(arguments.contains("intro"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_response_done_transcript() {
        let text = r#"{
            "type": "response.done",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [{ "type": "message", "content": [{ "type": "audio", "transcript": "Hello there!" }] }]
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        let ServerEvent::ResponseDone { response } = event else {
            panic!("expected response.done");
        };
        assert_eq!(response.transcript(), Some("Hello there!"));
    }

    #[test]
    fn test_response_done_text_after_function_call() {
        let text = r#"{
            "type": "response.done",
            "response": {
                "output": [
                    { "type": "function_call", "name": "detect_user_language" },
                    { "type": "message", "content": [{ "type": "text", "text": "Namaste!" }] }
                ]
            }
        }"#;
        let event: ServerEvent = serde_json::from_str(text).unwrap();
        let ServerEvent::ResponseDone { response } = event else {
            panic!("expected response.done");
        };
        assert_eq!(response.transcript(), Some("Namaste!"));
    }

    #[test]
    fn test_response_done_without_output_has_no_transcript() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"response.done","response":{"output":[]}}"#).unwrap();
        let ServerEvent::ResponseDone { response } = event else {
            panic!("expected response.done");
        };
        assert_eq!(response.transcript(), None);
    }

    #[test]
    fn test_speech_ended_alias_and_unknown_types() {
        let stopped: ServerEvent =
            serde_json::from_str(r#"{"type":"input_audio_buffer.speech_ended","audio_end_ms":10}"#)
                .unwrap();
        assert_eq!(stopped, ServerEvent::SpeechStopped);

        let unknown: ServerEvent =
            serde_json::from_str(r#"{"type":"session.created","session":{}}"#).unwrap();
        assert_eq!(unknown, ServerEvent::Unknown);
    }

    #[test]
    fn test_error_event() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad tool"}}"#,
        )
        .unwrap();
        let ServerEvent::Error { error } = event else {
            panic!("expected error");
        };
        assert_eq!(error.message, "bad tool");
        assert_eq!(error.kind.as_deref(), Some("invalid_request_error"));
    }
}
