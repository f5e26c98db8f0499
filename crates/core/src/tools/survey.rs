//! Structured-interview tools: recording answers, choosing the next item,
//! the completion check and the closing summary.

use super::{SessionEffect, ToolContext, ToolError, ToolSpec, parse, restrict_enum, schema_for};
use crate::{
    events::LogEvent,
    persona::PersonaDescriptor,
    state::{NextItem, SessionSummary},
};
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

const INTRO_ITEM: &str = "intro";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnswerEmotion {
    Neutral,
    Anxious,
    Confused,
    Frustrated,
    Hopeful,
    Excited,
    Overwhelmed,
}

impl AnswerEmotion {
    fn as_str(&self) -> &'static str {
        match self {
            AnswerEmotion::Neutral => "neutral",
            AnswerEmotion::Anxious => "anxious",
            AnswerEmotion::Confused => "confused",
            AnswerEmotion::Frustrated => "frustrated",
            AnswerEmotion::Hopeful => "hopeful",
            AnswerEmotion::Excited => "excited",
            AnswerEmotion::Overwhelmed => "overwhelmed",
        }
    }
}

/// Record a participant's answer to one interview item.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TrackResponseArgs {
    /// The id of the item being answered (e.g. 'intro', 'academic_status').
    pub question_id: String,
    /// The participant's complete answer.
    pub response: String,
    /// Any notable emotion detected in the answer.
    #[serde(default)]
    pub emotion_detected: Option<AnswerEmotion>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ParticipantProfile {
    /// First name.
    #[serde(default)]
    pub name: Option<String>,
    /// Academic year (e.g. 'freshman', 'senior').
    #[serde(default)]
    pub year: Option<String>,
    /// Current major or 'undecided'.
    #[serde(default)]
    pub major: Option<String>,
    /// Main concern identified so far.
    #[serde(default)]
    pub primary_concern: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NextQuestionArgs {
    /// Item ids the remote party believes are already covered.
    #[serde(default)]
    pub completed_questions: Vec<String>,
    #[serde(default)]
    pub student_profile: Option<ParticipantProfile>,
    /// Skip optional items to keep the conversation short.
    #[serde(default)]
    pub skip_optional: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompletionArgs {
    /// Number of substantive answers collected.
    #[serde(default)]
    pub responses_count: Option<u32>,
    /// Required item ids that have been answered.
    #[serde(default)]
    pub required_questions_answered: Vec<String>,
    /// Conversation length in minutes.
    #[serde(default)]
    pub conversation_duration: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct AcademicInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_info: Option<AcademicInfo>,
    /// Career-related concerns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub career_concerns: Vec<String>,
    /// Interests and passions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    /// Self-identified skills.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    /// Concerns about AI and job automation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_automation_fears: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_industries: Vec<String>,
    /// Prioritized career values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub work_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<String>,
    /// Most pressing need for guidance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate_needs: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummaryArgs {
    /// The participant's name.
    pub student_name: String,
    pub session_data: SessionData,
    /// Initial recommendations based on the conversation.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

pub(super) fn definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "track_survey_response",
            description: "Record a participant's answer to an interview item. Use this whenever they give a substantive answer to one of your questions.",
            parameters: track_parameters,
            handler: track_survey_response,
        },
        ToolSpec {
            name: "determine_next_question",
            description: "Determine which item to ask next based on what has been covered. Call this immediately after recording an answer.",
            parameters: |_| schema_for::<NextQuestionArgs>(),
            handler: determine_next_question,
        },
        ToolSpec {
            name: "check_completion_status",
            description: "Check whether enough information has been gathered to complete the interview.",
            parameters: |_| schema_for::<CompletionArgs>(),
            handler: check_completion_status,
        },
        ToolSpec {
            name: "end_session_summary",
            description: "Generate and save a summary of the session. Use when the necessary items are answered or the participant asks to finish.",
            parameters: |_| schema_for::<SummaryArgs>(),
            handler: end_session_summary,
        },
    ]
}

fn track_parameters(persona: &PersonaDescriptor) -> Value {
    let mut schema = schema_for::<TrackResponseArgs>();
    restrict_enum(&mut schema, "question_id", persona.items.all().cloned());
    schema
}

fn track_survey_response(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: TrackResponseArgs = parse(args)?;
    if !ctx.persona.items.contains(&args.question_id) {
        return Err(ToolError::UnknownItem(args.question_id));
    }

    let emotion = args.emotion_detected.unwrap_or(AnswerEmotion::Neutral);
    let completed_count = ctx.state.record_answer(
        &args.question_id,
        args.response.as_str(),
        Some(emotion.as_str().to_string()),
        Utc::now(),
    );

    let name = args.response.trim();
    if args.question_id == INTRO_ITEM && !name.is_empty() {
        ctx.state.participant_name = Some(name.to_string());
    }

    let progress = ctx.state.progress(&ctx.persona.items);
    info!(
        item = %args.question_id,
        completed = progress.completed,
        total = progress.total,
        "Answer recorded"
    );
    ctx.effect(SessionEffect::Persist);

    Ok(json!({
        "message": format!("Response recorded for {}", args.question_id),
        "completed_count": completed_count,
    }))
}

fn determine_next_question(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: NextQuestionArgs = parse(args)?;
    if args.completed_questions.as_slice() != ctx.state.completed() {
        debug!(
            remote = ?args.completed_questions,
            local = ?ctx.state.completed(),
            "Remote completed list differs from local state"
        );
    }

    match ctx.state.next_item(&ctx.persona.items, args.skip_optional) {
        NextItem::Ask {
            item,
            remaining,
            optional,
        } => {
            ctx.state.current_item = Some(item.clone());
            ctx.effect(SessionEffect::Persist);
            Ok(json!({
                "next_question": item,
                "questions_remaining": remaining,
                "is_optional": optional,
                "already_completed": ctx.state.completed(),
                "student_name": ctx.state.participant_name,
            }))
        }
        NextItem::Complete { total_answered } => Ok(json!({
            "complete": true,
            "message": "All questions completed",
            "total_answered": total_answered,
        })),
    }
}

fn check_completion_status(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: CompletionArgs = parse(args)?;
    debug!(
        remote_count = ?args.responses_count,
        remote_answered = ?args.required_questions_answered,
        duration = ?args.conversation_duration,
        "Completion check requested"
    );

    let plan = &ctx.persona.items;
    let completion = ctx.state.completion(plan);
    let missing_core: Vec<&String> = plan
        .core
        .iter()
        .filter(|id| !ctx.state.is_completed(id))
        .collect();

    Ok(json!({
        "is_complete": completion.is_complete,
        "responses_count": completion.responses_count,
        "percentage": completion.percentage,
        "missing_core": missing_core,
    }))
}

fn end_session_summary(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: SummaryArgs = parse(args)?;
    let participant = Some(args.student_name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| ctx.state.participant_name.clone());

    let summary = SessionSummary {
        session_id: ctx.state.session_id.clone(),
        timestamp: Utc::now(),
        participant_name: participant,
        total_answered: ctx.state.completed().len(),
        session_data: serde_json::to_value(&args.session_data)?,
        recommendations: args.recommendations,
        raw_responses: ctx.state.answers().clone(),
    };
    ctx.state.concluded = true;
    info!(session_id = %summary.session_id, total_answered = summary.total_answered, "Session concluded");

    ctx.effect(SessionEffect::SaveSummary(Box::new(summary.clone())));
    ctx.effect(SessionEffect::ClearSaved);
    ctx.effect(SessionEffect::Publish(LogEvent::SessionSummary {
        summary: Box::new(summary),
    }));
    ctx.effect(SessionEffect::Notice(
        "Session summary has been generated and saved.".to_string(),
    ));

    Ok(json!({
        "summary_saved": true,
        "session_id": ctx.state.session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persona::PersonaDescriptor,
        state::ConversationState,
        tools::{ToolContext, ToolRegistry},
    };

    fn call(
        state: &mut ConversationState,
        name: &str,
        args: Value,
    ) -> (Value, Vec<SessionEffect>) {
        let persona = PersonaDescriptor::career();
        let registry = ToolRegistry::for_persona(&persona);
        let mut ctx = ToolContext::new(state, &persona);
        let result = registry.dispatch(&mut ctx, name, &args.to_string());
        (result, ctx.into_effects())
    }

    fn answer(state: &mut ConversationState, item: &str, response: &str) -> Value {
        call(
            state,
            "track_survey_response",
            json!({"question_id": item, "response": response}),
        )
        .0
    }

    #[test]
    fn test_track_records_and_persists() {
        let mut state = ConversationState::new("career");
        let (result, effects) = call(
            &mut state,
            "track_survey_response",
            json!({"question_id": "intro", "response": "  Isha ", "emotion_detected": "hopeful"}),
        );

        assert_eq!(result["success"], json!(true));
        assert_eq!(result["completed_count"], json!(1));
        assert_eq!(effects, vec![SessionEffect::Persist]);
        assert_eq!(state.participant_name.as_deref(), Some("Isha"));
        assert_eq!(state.answer("intro").unwrap().tag.as_deref(), Some("hopeful"));
    }

    #[test]
    fn test_track_defaults_emotion_and_rejects_unknown_items() {
        let mut state = ConversationState::new("career");
        answer(&mut state, "skills", "Rust");
        assert_eq!(state.answer("skills").unwrap().tag.as_deref(), Some("neutral"));

        let (result, effects) = call(
            &mut state,
            "track_survey_response",
            json!({"question_id": "favourite_colour", "response": "blue"}),
        );
        assert_eq!(result["success"], json!(false));
        assert!(effects.is_empty());
        assert_eq!(state.completed().len(), 1);
    }

    #[test]
    fn test_re_answering_does_not_duplicate() {
        let mut state = ConversationState::new("career");
        answer(&mut state, "skills", "Rust");
        let result = answer(&mut state, "skills", "Rust and Go");
        assert_eq!(result["completed_count"], json!(1));
        assert_eq!(state.answer("skills").unwrap().response, "Rust and Go");
    }

    #[test]
    fn test_next_question_uses_local_state() {
        let mut state = ConversationState::new("career");
        answer(&mut state, "intro", "Isha");

        let (result, effects) = call(
            &mut state,
            "determine_next_question",
            json!({"completed_questions": ["intro", "academic_status", "interests"], "student_profile": {}}),
        );
        assert_eq!(result["next_question"], json!("academic_status"));
        assert_eq!(result["questions_remaining"], json!(11));
        assert_eq!(result["is_optional"], json!(false));
        assert_eq!(result["student_name"], json!("Isha"));
        assert_eq!(state.current_item.as_deref(), Some("academic_status"));
        assert_eq!(effects, vec![SessionEffect::Persist]);

        let (again, _) = call(&mut state, "determine_next_question", json!({}));
        assert_eq!(again["next_question"], result["next_question"]);
    }

    #[test]
    fn test_next_question_skips_optional_when_asked() {
        let mut state = ConversationState::new("career");
        for item in PersonaDescriptor::career().items.required.clone() {
            answer(&mut state, &item, "answer");
        }

        let (result, _) = call(&mut state, "determine_next_question", json!({}));
        assert_eq!(result["next_question"], json!("role_models"));
        assert_eq!(result["is_optional"], json!(true));

        let (result, effects) = call(
            &mut state,
            "determine_next_question",
            json!({"skip_optional": true}),
        );
        assert_eq!(result["complete"], json!(true));
        assert_eq!(result["total_answered"], json!(12));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_completion_needs_core_and_minimum() {
        let mut state = ConversationState::new("career");
        for item in ["intro", "academic_status", "career_confusion", "ai_fears", "immediate_need", "skills", "interests"] {
            answer(&mut state, item, "answer");
        }
        let (result, _) = call(&mut state, "check_completion_status", json!({"responses_count": 99}));
        assert_eq!(result["is_complete"], json!(false));
        assert_eq!(result["responses_count"], json!(7));
        assert_eq!(result["missing_core"], json!([]));

        answer(&mut state, "timeline", "soon");
        let (result, _) = call(&mut state, "check_completion_status", json!({}));
        assert_eq!(result["is_complete"], json!(true));
        assert_eq!(result["percentage"], json!(67));
    }

    #[test]
    fn test_summary_concludes_and_queues_effects() {
        let mut state = ConversationState::new("career");
        answer(&mut state, "intro", "Isha");

        let (result, effects) = call(
            &mut state,
            "end_session_summary",
            json!({
                "student_name": "",
                "session_data": {"interests": ["robotics"]},
                "recommendations": ["Talk to a mentor"]
            }),
        );

        assert_eq!(result["summary_saved"], json!(true));
        assert_eq!(result["session_id"], json!(state.session_id));
        assert!(state.concluded);

        let SessionEffect::SaveSummary(summary) = &effects[0] else {
            panic!("expected a summary first, got {:?}", effects[0]);
        };
        assert_eq!(summary.participant_name.as_deref(), Some("Isha"));
        assert_eq!(summary.total_answered, 1);
        assert_eq!(summary.session_data, json!({"interests": ["robotics"]}));
        assert_eq!(effects[1], SessionEffect::ClearSaved);
        assert!(matches!(effects[2], SessionEffect::Publish(LogEvent::SessionSummary { .. })));
        assert!(matches!(effects[3], SessionEffect::Notice(_)));
    }
}
