use super::{SessionEffect, ToolContext, ToolError, ToolSpec, parse, schema_for};
use crate::state::Language;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectLanguageArgs {
    /// The user's input text that was classified.
    pub user_text: String,
    /// The detected language.
    pub detected_language: Language,
    #[serde(default)]
    pub confidence: Option<Confidence>,
}

pub(super) fn definitions() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "detect_user_language",
        description: "Report the language of the user's latest input. Call this for EVERY user input so replies use the same language, and when the user explicitly asks to switch.",
        parameters: |_| schema_for::<DetectLanguageArgs>(),
        handler: detect_user_language,
    }]
}

/// The classification comes from the remote party; this only records it.
fn detect_user_language(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: DetectLanguageArgs = parse(args)?;
    ctx.state.set_language(args.detected_language);
    info!(
        language = args.detected_language.as_str(),
        confidence = ?args.confidence,
        chars = args.user_text.chars().count(),
        "Language detected"
    );
    ctx.effect(SessionEffect::Persist);

    Ok(json!({
        "language_updated": true,
        "current_language": ctx.state.language,
        "previous_language": ctx.state.previous_language,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persona::{PersonaDescriptor, PortfolioProfile},
        state::ConversationState,
        tools::ToolRegistry,
    };

    #[test]
    fn test_language_flags_shift() {
        let persona = PersonaDescriptor::portfolio(PortfolioProfile::default());
        let registry = ToolRegistry::for_persona(&persona);
        let mut state = ConversationState::new("portfolio");

        let mut ctx = ToolContext::new(&mut state, &persona);
        let result = registry.dispatch(
            &mut ctx,
            "detect_user_language",
            r#"{"user_text": "aap kaise ho", "detected_language": "hinglish", "confidence": "high"}"#,
        );
        assert_eq!(result["current_language"], json!("hinglish"));
        assert_eq!(result["previous_language"], json!("english"));
        assert_eq!(ctx.into_effects(), vec![SessionEffect::Persist]);

        {
            let mut ctx = ToolContext::new(&mut state, &persona);
            registry.dispatch(
                &mut ctx,
                "detect_user_language",
                r#"{"user_text": "switch to English", "detected_language": "english"}"#,
            );
        }
        assert_eq!(state.language, Language::English);
        assert_eq!(state.previous_language, Language::Hinglish);
    }

    #[test]
    fn test_unsupported_language_is_rejected() {
        let persona = PersonaDescriptor::portfolio(PortfolioProfile::default());
        let registry = ToolRegistry::for_persona(&persona);
        let mut state = ConversationState::new("portfolio");
        let result = {
            let mut ctx = ToolContext::new(&mut state, &persona);
            registry.dispatch(
                &mut ctx,
                "detect_user_language",
                r#"{"user_text": "bonjour", "detected_language": "french"}"#,
            )
        };
        assert_eq!(result["success"], json!(false));
        assert_eq!(state.language, Language::English);
    }
}
