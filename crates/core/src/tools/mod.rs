//! Tool Registry and Dispatcher
//!
//! Every remote tool invocation is looked up by wire name in a registry built
//! once per persona. Handlers are plain functions over the conversation
//! state; anything they need the runtime to do (persist, tear down, publish)
//! is queued as a [`SessionEffect`] and executed by the session driver after
//! the result has been sent back.

mod guidance;
mod language;
mod lifecycle;
mod portfolio;
mod survey;

use crate::{
    events::LogEvent,
    persona::PersonaDescriptor,
    state::{ConversationState, SessionSummary},
};
use realtime_types::ToolDefinition;
use schemars::{JsonSchema, generate::SchemaSettings};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

/// Side effects a handler asks the runtime to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Write the state and transcript to durable storage.
    Persist,
    /// Remove the active-session record.
    ClearSaved,
    SaveSummary(Box<SessionSummary>),
    /// Show a system line in the transcript.
    Notice(String),
    /// Show an assistant line in the transcript.
    Say(String),
    Publish(LogEvent),
    /// Tear the connection down and leave the state resumable.
    Pause,
    /// Tear the connection down and hand over to the logout flow.
    Logout { clear: bool },
}

impl SessionEffect {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEffect::Pause | SessionEffect::Logout { .. })
    }
}

/// Handler-level failures. These never leave the dispatcher; they become a
/// `{"success": false}` result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("{0}")]
    Rejected(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::InvalidArguments(e.to_string())
    }
}

/// What a handler can see and touch during one invocation.
pub struct ToolContext<'a> {
    pub state: &'a mut ConversationState,
    pub persona: &'a PersonaDescriptor,
    effects: Vec<SessionEffect>,
}

impl<'a> ToolContext<'a> {
    pub fn new(state: &'a mut ConversationState, persona: &'a PersonaDescriptor) -> Self {
        Self {
            state,
            persona,
            effects: Vec::new(),
        }
    }

    pub fn effect(&mut self, effect: SessionEffect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[SessionEffect] {
        &self.effects
    }

    pub fn into_effects(self) -> Vec<SessionEffect> {
        self.effects
    }
}

pub type ToolHandler = fn(&mut ToolContext<'_>, Value) -> Result<Value, ToolError>;

/// One entry of the tool catalogue.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Builds the argument schema; some enums depend on the persona.
    pub parameters: fn(&PersonaDescriptor) -> Value,
    pub handler: ToolHandler,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec").field("name", &self.name).finish()
    }
}

/// Every tool any persona may register.
pub fn catalogue() -> Vec<ToolSpec> {
    let mut specs = survey::definitions();
    specs.extend(guidance::definitions());
    specs.extend(language::definitions());
    specs.extend(portfolio::definitions());
    specs.extend(lifecycle::definitions());
    specs
}

#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Registers the persona's tools in the order the persona lists them.
    pub fn for_persona(persona: &PersonaDescriptor) -> Self {
        let mut available = catalogue();
        let mut tools = Vec::with_capacity(persona.tools.len());
        for name in &persona.tools {
            match available.iter().position(|spec| spec.name == *name) {
                Some(index) => tools.push(available.swap_remove(index)),
                None => warn!(tool = %name, persona = %persona.kind, "Persona lists a tool with no handler"),
            }
        }
        Self { tools }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|spec| spec.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool declarations for the `session.update` message.
    pub fn definitions(&self, persona: &PersonaDescriptor) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|spec| ToolDefinition::function(spec.name, spec.description, (spec.parameters)(persona)))
            .collect()
    }

    /// Runs the named handler and returns the JSON result to send back.
    ///
    /// Never fails: an unknown name, unparsable arguments or a handler error
    /// all come back as `{"success": false, "error": ..}`.
    pub fn dispatch(&self, ctx: &mut ToolContext<'_>, name: &str, arguments: &str) -> Value {
        let Some(spec) = self.tools.iter().find(|spec| spec.name == name) else {
            warn!(tool = %name, "Unknown tool requested");
            return failure("unknown tool");
        };

        let args = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool arguments did not parse");
                return failure(&e.to_string());
            }
        };

        info!(tool = %name, "Executing tool");
        match (spec.handler)(ctx, args) {
            Ok(result) => with_success(result),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool handler failed");
                failure(&e.to_string())
            }
        }
    }
}

fn parse_arguments(arguments: &str) -> Result<Value, ToolError> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str(arguments)? {
        Value::Null => Ok(Value::Object(Map::new())),
        value @ Value::Object(_) => Ok(value),
        _ => Err(ToolError::InvalidArguments(
            "arguments must be a JSON object".to_string(),
        )),
    }
}

pub(crate) fn failure(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

fn with_success(result: Value) -> Value {
    match result {
        Value::Object(mut map) => {
            map.entry("success").or_insert(Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "result": other }),
    }
}

/// Deserializes handler arguments.
pub(crate) fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(args)?)
}

/// Argument schema for `T`, flattened into the shape the realtime API
/// accepts: subschemas inlined, no `$schema`/`title`, optional fields as
/// their plain type.
pub(crate) fn schema_for<T: JsonSchema>() -> Value {
    let schema = SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();
    let mut value = Value::from(schema);
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
        if !map.contains_key("properties") {
            map.insert("properties".to_string(), Value::Object(Map::new()));
        }
    }
    tidy(&mut value);
    value
}

fn tidy(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };

    if let Some(Value::Array(types)) = map.get("type") {
        let non_null: Vec<Value> = types
            .iter()
            .filter(|t| t.as_str() != Some("null"))
            .cloned()
            .collect();
        if non_null.len() == 1 {
            map.insert("type".to_string(), non_null[0].clone());
        }
    }

    if let Some(Value::Array(variants)) = map.get("anyOf") {
        let non_null: Vec<Value> = variants
            .iter()
            .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
            .cloned()
            .collect();
        if non_null.len() == 1 && variants.len() == 2 {
            map.remove("anyOf");
            if let Value::Object(inner) = &non_null[0] {
                for (key, field) in inner {
                    map.entry(key.clone()).or_insert_with(|| field.clone());
                }
            }
        }
    }

    if let Some(Value::Array(options)) = map.get_mut("enum") {
        options.retain(|v| !v.is_null());
    }
    map.remove("format");
    if map.get("default").is_some_and(Value::is_null) {
        map.remove("default");
    }

    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for property in properties.values_mut() {
            tidy(property);
        }
    }
    if let Some(items) = map.get_mut("items") {
        tidy(items);
    }
}

/// Restricts a string property to `values`.
pub(crate) fn restrict_enum<I, S>(schema: &mut Value, property: &str, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<Value> = values.into_iter().map(|v| Value::String(v.into())).collect();
    if values.is_empty() {
        return;
    }
    if let Some(field) = schema
        .get_mut("properties")
        .and_then(|p| p.get_mut(property))
        .and_then(Value::as_object_mut)
    {
        field.insert("enum".to_string(), Value::Array(values));
    }
}
