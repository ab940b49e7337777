/// Error types for query handling
use thiserror::Error;

/// Failures that can occur while answering a query
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("failed to interpret the query: {0}")]
    Interpretation(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("command failed: {0}")]
    Command(String),

    #[error("prompt template error: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AgentError {
    /// Whether the failure came from the Kubernetes API
    pub fn is_kube(&self) -> bool {
        matches!(self, AgentError::Kube(_))
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(e: serde_yaml::Error) -> Self {
        AgentError::Serialization(e.to_string())
    }
}

impl From<handlebars::RenderError> for AgentError {
    fn from(e: handlebars::RenderError) -> Self {
        AgentError::Template(e.to_string())
    }
}

impl From<handlebars::TemplateError> for AgentError {
    fn from(e: handlebars::TemplateError) -> Self {
        AgentError::Template(e.to_string())
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_kube() {
        assert!(!AgentError::Llm("timeout".to_string()).is_kube());
        assert!(!AgentError::Command("exit 1".to_string()).is_kube());
    }

    #[test]
    fn test_display() {
        let err = AgentError::Interpretation("missing 'action'".to_string());
        assert_eq!(
            err.to_string(),
            "failed to interpret the query: missing 'action'"
        );
    }
}
