//! Conversational steering tools. They change nothing durable; the remote
//! party uses them to reason out loud and the results acknowledge it.

use super::{SessionEffect, ToolContext, ToolError, ToolSpec, parse, schema_for};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

const SUPPORT_NOTICE: &str = "Based on the conversation, additional support may be beneficial.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClarificationType {
    Definition,
    Example,
    Rephrase,
    Context,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClarificationArgs {
    /// The item that needs clarification.
    pub question_id: String,
    /// Kind of clarification needed.
    pub clarification_type: ClarificationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anxiety,
    Overwhelm,
    Frustration,
    Confusion,
    Hopelessness,
    Neutral,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmotionalStateArgs {
    /// Primary emotion detected.
    pub detected_emotion: Emotion,
    pub intensity: Intensity,
    /// What triggered this response.
    #[serde(default)]
    pub trigger: Option<String>,
    /// Whether professional support should be suggested.
    #[serde(default)]
    pub support_needed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    HighlyEngaged,
    ModeratelyEngaged,
    LowEngagement,
    Disengaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DepthAdjustment {
    GoDeeper,
    MaintainPace,
    SpeedUp,
    WrapUpSoon,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DepthArgs {
    /// The participant's current engagement level.
    pub current_engagement: Engagement,
    /// How to adjust the conversation.
    pub adjustment_action: DepthAdjustment,
    #[serde(default)]
    pub reason: Option<String>,
}

pub(super) fn definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "provide_clarification",
            description: "Provide clarification or examples when the participant doesn't understand a question or needs more context.",
            parameters: |_| schema_for::<ClarificationArgs>(),
            handler: provide_clarification,
        },
        ToolSpec {
            name: "detect_emotional_state",
            description: "Note the participant's emotional state, especially if they seem overwhelmed, anxious, or need support.",
            parameters: |_| schema_for::<EmotionalStateArgs>(),
            handler: detect_emotional_state,
        },
        ToolSpec {
            name: "adjust_conversation_depth",
            description: "Adjust the depth and pace of questioning based on engagement.",
            parameters: |_| schema_for::<DepthArgs>(),
            handler: adjust_conversation_depth,
        },
    ]
}

fn provide_clarification(_ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: ClarificationArgs = parse(args)?;
    Ok(json!({
        "clarification_provided": true,
        "question_id": args.question_id,
        "type": args.clarification_type,
    }))
}

fn detect_emotional_state(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: EmotionalStateArgs = parse(args)?;
    info!(
        emotion = ?args.detected_emotion,
        intensity = ?args.intensity,
        trigger = args.trigger.as_deref().unwrap_or(""),
        "Emotional state detected"
    );
    if args.support_needed {
        ctx.effect(SessionEffect::Notice(SUPPORT_NOTICE.to_string()));
    }

    Ok(json!({
        "emotion_tracked": true,
        "emotion": args.detected_emotion,
        "intensity": args.intensity,
    }))
}

fn adjust_conversation_depth(_ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: DepthArgs = parse(args)?;
    info!(
        action = ?args.adjustment_action,
        reason = args.reason.as_deref().unwrap_or(""),
        "Adjusting conversation depth"
    );
    Ok(json!({
        "adjustment_made": true,
        "engagement_level": args.current_engagement,
        "action": args.adjustment_action,
    }))
}
