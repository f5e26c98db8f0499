//! Portfolio persona tools: answering from the knowledge profile and taking
//! interview requests.

use super::{SessionEffect, ToolContext, ToolError, ToolSpec, parse, restrict_enum, schema_for};
use crate::persona::PersonaDescriptor;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

/// Categories offered when the profile defines no sections of its own.
const DEFAULT_CATEGORIES: [&str; 6] = [
    "employment",
    "education",
    "skills",
    "projects",
    "achievements",
    "certifications",
];

const FALLBACK_DETAILS: &str = "Complete portfolio information available upon request.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PortfolioDetailsArgs {
    /// Category of information requested.
    pub category: String,
    /// Specific information being asked about.
    #[serde(default)]
    pub specific_query: Option<String>,
    /// Whether to include specific metrics and numbers.
    #[serde(default)]
    pub include_metrics: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InterviewArgs {
    /// Name of the person asking for the interview.
    pub hr_name: String,
    #[serde(default)]
    pub company: Option<String>,
    /// Preferred time for the interview.
    #[serde(default)]
    pub preferred_time: Option<String>,
}

pub(super) fn definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "provide_portfolio_details",
            description: "Provide detailed portfolio information when asked about specific aspects of career, skills, or achievements.",
            parameters: details_parameters,
            handler: provide_portfolio_details,
        },
        ToolSpec {
            name: "schedule_interview",
            description: "Record a request to schedule an interview or follow-up meeting.",
            parameters: |_| schema_for::<InterviewArgs>(),
            handler: schedule_interview,
        },
    ]
}

fn categories(persona: &PersonaDescriptor) -> Vec<String> {
    match &persona.profile {
        Some(profile) if !profile.sections.is_empty() => profile.sections.keys().cloned().collect(),
        _ => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    }
}

fn details_parameters(persona: &PersonaDescriptor) -> Value {
    let mut schema = schema_for::<PortfolioDetailsArgs>();
    restrict_enum(&mut schema, "category", categories(persona));
    schema
}

fn provide_portfolio_details(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: PortfolioDetailsArgs = parse(args)?;
    let content = ctx
        .persona
        .profile
        .as_ref()
        .and_then(|profile| profile.sections.get(&args.category))
        .map(String::as_str)
        .unwrap_or(FALLBACK_DETAILS)
        .to_string();

    ctx.state.push_history(
        "portfolio_query",
        json!({ "category": args.category, "query": args.specific_query }),
    );
    ctx.effect(SessionEffect::Persist);

    Ok(json!({
        "category": args.category,
        "content": content,
        "query": args.specific_query,
        "include_metrics": args.include_metrics,
    }))
}

fn schedule_interview(ctx: &mut ToolContext<'_>, args: Value) -> Result<Value, ToolError> {
    let args: InterviewArgs = parse(args)?;
    let requester = args.hr_name.trim();
    if requester.is_empty() {
        return Err(ToolError::Rejected("a name is needed to note the request".to_string()));
    }
    info!(
        requester = %requester,
        company = args.company.as_deref().unwrap_or(""),
        preferred_time = args.preferred_time.as_deref().unwrap_or(""),
        "Interview request"
    );

    ctx.state.push_history(
        "interview_request",
        json!({
            "hr_name": requester,
            "company": args.company,
            "preferred_time": args.preferred_time,
        }),
    );
    ctx.effect(SessionEffect::Persist);

    let message = match args.company.as_deref().filter(|c| !c.is_empty()) {
        Some(company) => format!("Interview request noted for {} from {}", requester, company),
        None => format!("Interview request noted for {}", requester),
    };
    let contact = ctx.persona.profile.as_ref().and_then(|p| p.contact.clone());

    Ok(json!({
        "message": message,
        "preferred_time": args.preferred_time,
        "contact_info": contact,
    }))
}
