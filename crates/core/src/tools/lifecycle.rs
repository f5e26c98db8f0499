//! Tools that end the live connection: pause, logout and exit.

use super::{SessionEffect, ToolContext, ToolError, ToolSpec, parse, schema_for};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StopArgs {
    /// Whether to save progress for resuming later.
    #[serde(default = "default_true", alias = "save_session")]
    pub save_progress: bool,
    /// Reason for stopping.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogoutArgs {
    /// Confirmation to proceed with logout.
    #[serde(default = "default_true")]
    pub confirm_logout: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExitArgs {
    /// Farewell line shown before leaving.
    #[serde(default)]
    pub farewell_message: Option<String>,
    /// Whether to clear saved session data.
    #[serde(default)]
    pub clear_session: bool,
}

pub(super) fn definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "stop_conversation",
            description: "Stop the conversation when the user wants to pause, stop, or take a break. This ends the current session but keeps the progress.",
            parameters: |_| schema_for::<StopArgs>(),
            handler: stop_conversation,
        },
        ToolSpec {
            name: "trigger_logout",
            description: "Trigger logout when the user says quit, exit, logout, or similar. This ends the session and logs the user out.",
            parameters: |_| schema_for::<LogoutArgs>(),
            handler: trigger_logout,
        },
        ToolSpec {
            name: "exit_session",
            description: "Exit the session completely when the user says quit, exit, logout, or end session.",
            parameters: |_| schema_for::<ExitArgs>(),
            handler: exit_session,
        },
    ]
}

fn stop_conversation(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: StopArgs = parse(args)?;
    info!(
        save = args.save_progress,
        reason = args.reason.as_deref().unwrap_or(""),
        "Stop requested"
    );
    ctx.state.paused = true;
    if args.save_progress {
        ctx.effect(SessionEffect::Persist);
    }
    ctx.effect(SessionEffect::Pause);

    Ok(json!({
        "conversation_stopped": true,
        "progress_saved": args.save_progress,
        "message": "Conversation paused. You can resume anytime.",
    }))
}

fn trigger_logout(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: LogoutArgs = parse(args)?;
    if !args.confirm_logout {
        return Ok(json!({
            "success": false,
            "logout_triggered": false,
            "message": "Logout cancelled",
        }));
    }

    ctx.effect(SessionEffect::ClearSaved);
    ctx.effect(SessionEffect::Logout { clear: true });
    Ok(json!({
        "logout_triggered": true,
        "message": "Logging out and clearing session data",
    }))
}

fn exit_session(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: ExitArgs = parse(args)?;
    if let Some(farewell) = args.farewell_message.filter(|m| !m.trim().is_empty()) {
        ctx.effect(SessionEffect::Say(farewell));
    }
    ctx.effect(if args.clear_session {
        SessionEffect::ClearSaved
    } else {
        SessionEffect::Persist
    });
    ctx.effect(SessionEffect::Logout {
        clear: args.clear_session,
    });

    Ok(json!({
        "session_ended": true,
        "session_cleared": args.clear_session,
    }))
}
