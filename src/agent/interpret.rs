/// Query interpretation: free text in, `RawAction` out
use serde_json::Value;
use tracing::debug;

use super::action::RawAction;
use crate::error::{AgentError, AgentResult};
use crate::llm::{LlmCompletion, PromptTemplates};

/// Ask the LLM to turn a query into an action record
pub async fn interpret_query(
    llm: &dyn LlmCompletion,
    prompts: &PromptTemplates,
    query: &str,
    max_tokens: u32,
) -> AgentResult<RawAction> {
    let system = prompts.interpret_system()?;
    let user = prompts.interpret_user(query)?;

    let reply = llm.complete(&system, &user, max_tokens).await?;
    debug!("Assistant reply: {}", reply);

    parse_action_reply(&reply)
}

/// Parse the assistant's reply into an action, tolerating code fences and
/// prose around the JSON object
pub fn parse_action_reply(reply: &str) -> AgentResult<RawAction> {
    let json = extract_json_object(reply).ok_or_else(|| {
        AgentError::Interpretation("assistant reply contains no JSON object".to_string())
    })?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AgentError::Interpretation(format!("invalid JSON: {}", e)))?;

    if value.get("action").is_none() || value.get("parameters").is_none() {
        return Err(AgentError::Interpretation(
            "missing 'action' or 'parameters' keys".to_string(),
        ));
    }

    // A null parameters object is treated like an empty one
    let mut value = value;
    if value["parameters"].is_null() {
        value["parameters"] = Value::Object(Default::default());
    }

    serde_json::from_value(value)
        .map_err(|e| AgentError::Interpretation(format!("unexpected action shape: {}", e)))
}

/// Slice from the first `{` to the last `}`
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
