//! Model-backed role execution.
//!
//! Each permitted successor is offered to the model as a `transfer_to_<role>` tool;
//! calling one declares the handoff. Bound capabilities ride along as extra tools.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm_client::{LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::pipeline::context::ConversationContext;
use crate::pipeline::orchestrator::{RoleExecutor, RoleTurn};
use crate::pipeline::prompts::{HANDOFF_INSTRUCTION_TEMPLATE, NO_HANDOFF_INSTRUCTION};
use crate::pipeline::roles::RoleSpec;

const TRANSFER_PREFIX: &str = "transfer_to_";
const MAX_TOOL_NAME_LENGTH: usize = 64;
/// Stop reasons after which the text is cut off or the model expects to be resumed.
const UNFINISHED_STOP_REASONS: &[&str] = &["max_tokens", "pause_turn"];

pub struct LlmRoleExecutor {
    llm: LlmClient,
    model: String,
}

impl LlmRoleExecutor {
    pub fn new(llm: LlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl RoleExecutor for LlmRoleExecutor {
    async fn execute(
        &self,
        role: &RoleSpec,
        successors: &[&str],
        context: &ConversationContext,
    ) -> anyhow::Result<RoleTurn> {
        let tools: Vec<Value> = successors
            .iter()
            .map(|s| transfer_tool(s))
            .chain(role.capabilities().iter().map(|c| c.tool.clone()))
            .collect();
        let system = build_system_prompt(role, successors);
        let prompt = context.transcript();

        let response = self
            .llm
            .call(&LlmRequest {
                model: &self.model,
                system: &system,
                prompt: &prompt,
                tools: &tools,
            })
            .await?;

        Ok(turn_from_response(&response, successors)?)
    }
}

/// Turns a finished response into a role turn. A truncated or paused response is
/// an error rather than a terminal turn.
fn turn_from_response(response: &LlmResponse, successors: &[&str]) -> Result<RoleTurn, LlmError> {
    if let Some(reason) = response
        .stop_reason
        .as_deref()
        .filter(|r| UNFINISHED_STOP_REASONS.contains(r))
    {
        return Err(LlmError::Incomplete {
            stop_reason: reason.to_string(),
        });
    }

    let output = response.text();
    let handoff = response
        .tool_calls()
        .find_map(|name| resolve_handoff(name, successors));

    if output.trim().is_empty() && handoff.is_none() {
        return Err(LlmError::EmptyContent);
    }

    Ok(RoleTurn { output, handoff })
}

/// `transfer_to_` + the role name lowercased with every non-alphanumeric run
/// collapsed to one underscore, capped at 64 characters.
pub fn transfer_tool_name(role_name: &str) -> String {
    let mut slug = String::with_capacity(role_name.len());
    for c in role_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let mut name = format!("{TRANSFER_PREFIX}{}", slug.trim_matches('_'));
    name.truncate(MAX_TOOL_NAME_LENGTH);
    name
}

fn transfer_tool(role_name: &str) -> Value {
    json!({
        "name": transfer_tool_name(role_name),
        "description": format!("Hand the evaluation over to the {role_name}."),
        "input_schema": {"type": "object", "properties": {}, "required": []},
    })
}

/// Maps a called tool back to a successor name. Transfer tools that match no
/// successor come back as their raw suffix, so the orchestrator sees (and rejects)
/// the requested target instead of it being dropped. Other tools are not handoffs.
fn resolve_handoff(tool_name: &str, successors: &[&str]) -> Option<String> {
    let suffix = tool_name.strip_prefix(TRANSFER_PREFIX)?;
    let target = successors
        .iter()
        .find(|s| transfer_tool_name(s) == tool_name)
        .map(|s| s.to_string())
        .unwrap_or_else(|| suffix.to_string());
    Some(target)
}

fn build_system_prompt(role: &RoleSpec, successors: &[&str]) -> String {
    let mut system = role.instructions().to_string();
    if successors.is_empty() {
        system.push_str(NO_HANDOFF_INSTRUCTION);
    } else {
        let lines: Vec<String> = successors
            .iter()
            .map(|s| format!("- {} ({s})", transfer_tool_name(s)))
            .collect();
        system.push_str(&HANDOFF_INSTRUCTION_TEMPLATE.replace("{successors}", &lines.join("\n")));
    }
    system
}
