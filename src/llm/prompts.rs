/// Prompt templates for query interpretation and fallback command synthesis
use handlebars::Handlebars;
use serde_json::json;

use crate::agent::action::{ActionKind, SUPPORTED_DETAILS};
use crate::agent::fallback::ALLOWED_VERBS;
use crate::error::AgentResult;

const INTERPRET_SYSTEM: &str = "interpret_system";
const INTERPRET_USER: &str = "interpret_user";
const FALLBACK_SYSTEM: &str = "fallback_system";
const FALLBACK_USER: &str = "fallback_user";

const INTERPRET_SYSTEM_TEMPLATE: &str = "You are a Kubernetes assistant. Your task is to interpret the user's query and output a JSON object \
with two keys: 'action' and 'parameters'. The 'action' must be one of [{{#each actions}}'{{this}}'{{#unless @last}}, {{/unless}}{{/each}}]. \
Use 'get_owned_pods' when the user asks which pods a deployment spawned or owns. \
If the user's intent does not match any of these actions, set 'action' to 'unknown'. \
The 'parameters' should include 'resource_type' (e.g., 'pod', 'deployment', 'service', 'node'), \
'resource_name' if applicable, 'namespace' if specified, and any specific 'detail' the user is requesting \
(one of {{#each details}}'{{this}}'{{#unless @last}}, {{/unless}}{{/each}}). \
When the detail is 'environment_variable', put the variable name in 'variable_name'. \
Ensure 'resource_name' is the exact name used in Kubernetes, replacing spaces with hyphens if necessary, \
and exclude resource type abbreviations like 'svc', 'pod', etc. \
Do not include any additional text outside of the JSON object.";

const INTERPRET_USER_TEMPLATE: &str = "User query: {{query}}\nResponse:";

const FALLBACK_SYSTEM_TEMPLATE: &str = "You are a Kubernetes assistant with knowledge of kubectl.";

const FALLBACK_USER_TEMPLATE: &str = "The user has requested an action that has no dedicated handler: '{{query}}'. \
Suggest a single read-only kubectl command that would fulfill this request. \
The command must start with 'kubectl' and use one of these verbs: {{#each verbs}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}. \
Do not use pipes, redirection, or any other shell syntax. \
Respond only with the command without additional text.";

/// Compiled prompt templates
pub struct PromptTemplates {
    registry: Handlebars<'static>,
}

impl PromptTemplates {
    /// Compile all templates
    pub fn new() -> AgentResult<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        registry.register_template_string(INTERPRET_SYSTEM, INTERPRET_SYSTEM_TEMPLATE)?;
        registry.register_template_string(INTERPRET_USER, INTERPRET_USER_TEMPLATE)?;
        registry.register_template_string(FALLBACK_SYSTEM, FALLBACK_SYSTEM_TEMPLATE)?;
        registry.register_template_string(FALLBACK_USER, FALLBACK_USER_TEMPLATE)?;

        Ok(Self { registry })
    }

    /// System prompt for turning a query into an action
    pub fn interpret_system(&self) -> AgentResult<String> {
        let actions: Vec<&str> = ActionKind::KNOWN.iter().map(|a| a.as_str()).collect();
        Ok(self.registry.render(
            INTERPRET_SYSTEM,
            &json!({ "actions": actions, "details": SUPPORTED_DETAILS }),
        )?)
    }

    /// User prompt carrying the query
    pub fn interpret_user(&self, query: &str) -> AgentResult<String> {
        Ok(self.registry.render(INTERPRET_USER, &json!({ "query": query }))?)
    }

    /// System prompt for fallback command synthesis
    pub fn fallback_system(&self) -> AgentResult<String> {
        Ok(self.registry.render(FALLBACK_SYSTEM, &json!({}))?)
    }

    /// User prompt asking for a read-only kubectl command
    pub fn fallback_user(&self, query: &str) -> AgentResult<String> {
        Ok(self.registry.render(
            FALLBACK_USER,
            &json!({ "query": query, "verbs": ALLOWED_VERBS }),
        )?)
    }
}
