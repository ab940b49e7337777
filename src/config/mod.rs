/// Configuration management for Kubequery
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM completion service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Kubernetes access configuration
    #[serde(default)]
    pub kube: KubeConfig,

    /// LLM-suggested kubectl fallback
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Optional log file
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log file configuration; stdout logging is always on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file path (e.g., "agent.log"); rotated files get a date suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// How often the log file is rotated
    #[serde(default)]
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origin allowed by CORS (e.g., "http://localhost:3000")
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

/// LLM completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (can also be set via OPENAI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Token limit for query interpretation
    #[serde(default = "default_interpret_max_tokens")]
    pub interpret_max_tokens: u32,

    /// Token limit for fallback command suggestions
    #[serde(default = "default_fallback_max_tokens")]
    pub fallback_max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Kubernetes access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    /// Explicit kubeconfig path (inferred from the environment if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Number of log lines returned for log queries
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: i64,
}

/// Fallback configuration for queries that match no known action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Ask the LLM for a read-only kubectl command when no action matches
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// kubectl binary
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Command timeout in seconds
    #[serde(default = "default_fallback_timeout")]
    pub timeout_secs: u64,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_interpret_max_tokens() -> u32 {
    300
}

fn default_fallback_max_tokens() -> u32 {
    150
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_log_tail_lines() -> i64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_fallback_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            interpret_max_tokens: default_interpret_max_tokens(),
            fallback_max_tokens: default_fallback_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            log_tail_lines: default_log_tail_lines(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kubectl: default_kubectl(),
            timeout_secs: default_fallback_timeout(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;

        if self.llm.model.is_empty() {
            anyhow::bail!("llm.model cannot be empty");
        }

        url::Url::parse(&self.llm.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid llm.base_url {}: {}", self.llm.base_url, e))?;

        if self.llm.interpret_max_tokens == 0 || self.llm.fallback_max_tokens == 0 {
            anyhow::bail!("LLM token limits must be positive");
        }

        if self.kube.log_tail_lines <= 0 {
            anyhow::bail!("kube.log_tail_lines must be positive");
        }

        if self.fallback.enabled && self.fallback.kubectl.is_empty() {
            anyhow::bail!("fallback.kubectl cannot be empty when fallback is enabled");
        }

        Ok(())
    }

    /// Parsed server bind address
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid server.bind {}: {}", self.server.bind, e))
    }

    /// Get the LLM API key from config or environment
    pub fn get_api_key(&self) -> anyhow::Result<String> {
        self.llm.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!(
                "OpenAI API key is not set. Set OPENAI_API_KEY environment variable or specify llm.api_key in config"
            ))
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            logging: LoggingConfig {
                file: Some(PathBuf::from("agent.log")),
                ..LoggingConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = AgentConfig::example();
        assert!(config.validate().is_ok());

        config.llm.model = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bind_and_url() {
        let mut config = AgentConfig::default();
        config.server.bind = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.llm.base_url = "::nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "llm:\n  model: gpt-4o-mini\nfallback:\n  enabled: false\n";
        let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.interpret_max_tokens, 300);
        assert_eq!(config.llm.fallback_max_tokens, 150);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.server.cors_origin, "http://localhost:3000");
        assert!(!config.fallback.enabled);
        assert_eq!(config.fallback.kubectl, "kubectl");
    }

    #[test]
    fn test_example_matches_defaults() {
        let example = AgentConfig::example();
        let defaults = AgentConfig::default();

        assert_eq!(example.llm.model, defaults.llm.model);
        assert_eq!(example.fallback.timeout_secs, 30);
        assert_eq!(example.logging.file, Some(PathBuf::from("agent.log")));
        assert_eq!(example.logging.rotation, LogRotation::Daily);
        assert!(defaults.logging.file.is_none());

        let yaml = serde_yaml::to_string(&example).unwrap();
        let reloaded: AgentConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.logging.file, example.logging.file);
        assert!(!yaml.contains("api_key"));
    }

    #[test]
    fn test_logging_section() {
        let yaml = "logging:\n  file: /var/log/kubequery/agent.log\n  rotation: hourly\n";
        let config: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.logging.file,
            Some(PathBuf::from("/var/log/kubequery/agent.log"))
        );
        assert_eq!(config.logging.rotation, LogRotation::Hourly);

        assert!(serde_yaml::from_str::<AgentConfig>("logging:\n  rotation: weekly\n").is_err());
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = AgentConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        assert_eq!(config.get_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AgentConfig::load_or_default("/nonexistent/kubequery.yaml").unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 8000);
    }
}
