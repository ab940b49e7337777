/// Query agent: interpret a question, inspect the cluster, answer in text
pub mod action;
pub mod fallback;
pub mod handlers;
pub mod interpret;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tracing::{error, info};

use self::action::{Action, ActionKind};
use self::fallback::KubectlFallback;
use self::handlers::{ActionHandlers, NOT_UNDERSTOOD};
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::k8s::ClusterInspector;
use crate::llm::{LlmCompletion, PromptTemplates};

pub const KUBE_API_ERROR: &str = "An error occurred while communicating with the Kubernetes API.";
pub const ACTION_ERROR: &str = "An error occurred while performing the Kubernetes action.";

/// Answers one free-text query at a time; holds no per-query state
pub struct QueryAgent {
    llm: Arc<dyn LlmCompletion>,
    prompts: PromptTemplates,
    handlers: ActionHandlers,
    fallback: Option<KubectlFallback>,
    interpret_max_tokens: u32,
}

impl QueryAgent {
    pub fn new(
        config: &AgentConfig,
        llm: Arc<dyn LlmCompletion>,
        cluster: Arc<dyn ClusterInspector>,
    ) -> AgentResult<Self> {
        let fallback = config.fallback.enabled.then(|| {
            KubectlFallback::new(&config.fallback, &config.kube, config.llm.fallback_max_tokens)
        });

        Ok(Self {
            llm,
            prompts: PromptTemplates::new()?,
            handlers: ActionHandlers::new(cluster, config.kube.log_tail_lines),
            fallback,
            interpret_max_tokens: config.llm.interpret_max_tokens,
        })
    }

    /// Answer a query
    ///
    /// Cluster-side failures are reported in the answer text; only a blank
    /// query or a failed interpretation is returned as an error.
    pub async fn answer(&self, query: &str) -> AgentResult<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::InvalidRequest("query must not be empty".to_string()));
        }
        info!("Received query: {}", query);

        let raw = interpret::interpret_query(
            self.llm.as_ref(),
            &self.prompts,
            query,
            self.interpret_max_tokens,
        )
        .await?;
        info!("Interpreted action: {:?}", raw);

        let action = Action::normalize(&raw);
        let answer = if action.kind == ActionKind::Unknown || raw.parameters.is_empty() {
            info!("Action or parameters not recognized, using fallback");
            self.fallback(query).await
        } else {
            self.perform(&action).await
        };

        info!("Answer: {}", answer);
        Ok(answer)
    }

    async fn perform(&self, action: &Action) -> String {
        if let ActionKind::Unrecognized(name) = &action.kind {
            error!("Unknown action type after normalization: {}", name);
            return NOT_UNDERSTOOD.to_string();
        }

        match self.handlers.handle(action).await {
            Ok(answer) => answer,
            Err(e) if e.is_kube() => {
                error!("Kubernetes API exception: {}", e);
                KUBE_API_ERROR.to_string()
            }
            Err(e) => {
                error!("Error performing Kubernetes action: {}", e);
                ACTION_ERROR.to_string()
            }
        }
    }

    async fn fallback(&self, query: &str) -> String {
        match &self.fallback {
            Some(fallback) => {
                fallback
                    .answer(self.llm.as_ref(), &self.prompts, query)
                    .await
            }
            None => NOT_UNDERSTOOD.to_string(),
        }
    }
}
