/// Fallback for queries that match no known action: the LLM suggests one
/// read-only kubectl command, which is validated and then run
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use super::action::simplify_name;
use crate::config::{FallbackConfig, KubeConfig};
use crate::error::{AgentError, AgentResult};
use crate::llm::{LlmCompletion, PromptTemplates};
use crate::utils::command::CommandBuilder;

/// kubectl verbs that only read cluster state
pub const ALLOWED_VERBS: &[&str] = &[
    "get",
    "describe",
    "logs",
    "top",
    "version",
    "cluster-info",
    "api-resources",
    "api-versions",
    "explain",
];

/// Long flags that stream forever, read local files, or override credentials
const FORBIDDEN_FLAGS: &[&str] = &[
    "--watch",
    "--watch-only",
    "--follow",
    "--filename",
    "--kustomize",
    "--template",
    "--kubeconfig",
    "--token",
    "--server",
    "--as",
    "--as-group",
    "--as-uid",
    "--username",
    "--password",
    "--client-key",
    "--client-certificate",
    "--certificate-authority",
];

/// Short forms of the forbidden flags (`-w`, `-f`, `-k`, `-s`)
const FORBIDDEN_SHORT_FLAGS: &[char] = &['w', 'f', 'k', 's'];

/// Short flags whose value may be attached (`-nkube-system`) or follow
const SHORT_FLAGS_WITH_VALUE: &[char] = &['o', 'n', 'l', 'c', 'L'];

const SHELL_SYNTAX: &[&str] = &["|", ";", "&", ">", "<", "`", "$("];

pub const FALLBACK_FAILED: &str =
    "The requested action could not be performed. Please check the query or try again.";

/// Runs LLM-suggested kubectl commands
pub struct KubectlFallback {
    kubectl: String,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
    max_tokens: u32,
}

impl KubectlFallback {
    pub fn new(config: &FallbackConfig, kube: &KubeConfig, max_tokens: u32) -> Self {
        Self {
            kubectl: config.kubectl.clone(),
            kubeconfig: kube.kubeconfig.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_tokens,
        }
    }

    /// Answer `query` through a suggested command; failures become a fixed
    /// apology rather than an error
    pub async fn answer(
        &self,
        llm: &dyn LlmCompletion,
        prompts: &PromptTemplates,
        query: &str,
    ) -> String {
        match self.try_answer(llm, prompts, query).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error querying the LLM or executing suggested command: {}", e);
                FALLBACK_FAILED.to_string()
            }
        }
    }

    async fn try_answer(
        &self,
        llm: &dyn LlmCompletion,
        prompts: &PromptTemplates,
        query: &str,
    ) -> AgentResult<String> {
        let system = prompts.fallback_system()?;
        let user = prompts.fallback_user(query)?;
        let suggestion = llm.complete(&system, &user, self.max_tokens).await?;
        info!("LLM suggested command: {}", suggestion);

        let args = parse_suggested_command(&suggestion)?;

        let mut command = CommandBuilder::new(&self.kubectl)
            .args(&args)
            .timeout(self.timeout)
            .context(format!("Failed to run {} {}", self.kubectl, args.join(" ")));
        if let Some(path) = &self.kubeconfig {
            command = command.kubeconfig(path);
        }

        let stdout = command
            .run()
            .await
            .map_err(|e| AgentError::Command(format!("{:#}", e)))?;

        Ok(format_output(&args, &stdout))
    }
}

/// Validate a suggested command and return its arguments without the
/// leading `kubectl`
pub fn parse_suggested_command(reply: &str) -> AgentResult<Vec<String>> {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .map(|l| l.trim_start_matches("$ ").trim())
        .ok_or_else(|| AgentError::Command("empty command suggestion".to_string()))?;

    if let Some(token) = SHELL_SYNTAX.iter().find(|s| line.contains(*s)) {
        return Err(AgentError::Command(format!(
            "suggested command uses shell syntax '{}'",
            token
        )));
    }

    let tokens = shell_words::split(line)
        .map_err(|e| AgentError::Command(format!("cannot parse suggested command: {}", e)))?;

    match tokens.first().map(String::as_str) {
        Some("kubectl") => {}
        _ => {
            return Err(AgentError::Command(format!(
                "suggested command is not kubectl: {}",
                line
            )))
        }
    }

    let verb = tokens.get(1).map(String::as_str).unwrap_or_default();
    if !ALLOWED_VERBS.contains(&verb) {
        return Err(AgentError::Command(format!(
            "kubectl verb '{}' is not allowed",
            verb
        )));
    }

    check_flags(&tokens[2..])?;

    Ok(tokens[1..].to_vec())
}

fn forbidden(flag: &str) -> AgentError {
    AgentError::Command(format!("flag '{}' is not allowed", flag))
}

/// Reject forbidden flags in any spelling: `--flag=value`, grouped short
/// flags (`-Aw`) and attached short values (`-f/etc/passwd`)
fn check_flags(args: &[String]) -> AgentResult<()> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        if let Some(long) = arg.strip_prefix("--") {
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (long, None),
            };
            let flag = format!("--{}", name);
            if FORBIDDEN_FLAGS.contains(&flag.as_str()) {
                return Err(forbidden(arg));
            }
            if name == "output" {
                let value = inline.or_else(|| iter.next().map(String::as_str));
                check_output_format(value.unwrap_or_default())?;
            }
            continue;
        }

        let Some(group) = arg.strip_prefix('-').filter(|g| !g.is_empty()) else {
            continue;
        };
        for (idx, flag) in group.char_indices() {
            if FORBIDDEN_SHORT_FLAGS.contains(&flag) {
                return Err(forbidden(arg));
            }
            if SHORT_FLAGS_WITH_VALUE.contains(&flag) {
                let attached = &group[idx + flag.len_utf8()..];
                let attached = attached.strip_prefix('=').unwrap_or(attached);
                let value = if attached.is_empty() {
                    iter.next().map(String::as_str).unwrap_or_default()
                } else {
                    attached
                };
                if flag == 'o' {
                    check_output_format(value)?;
                }
                break;
            }
        }
    }
    Ok(())
}

/// Output formats that name a template file on the local host
fn check_output_format(value: &str) -> AgentResult<()> {
    let format = value.split('=').next().unwrap_or(value);
    if format.ends_with("file") {
        return Err(AgentError::Command(format!(
            "output format '{}' is not allowed",
            format
        )));
    }
    Ok(())
}

/// How the output of a `get` should be read
#[derive(Debug, PartialEq)]
enum OutputShape {
    Table,
    Names,
    Raw,
}

fn output_shape(args: &[String]) -> OutputShape {
    if args.first().map(String::as_str) != Some("get") {
        return OutputShape::Raw;
    }

    let mut format = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" || arg == "--output" {
            format = iter.next().cloned();
        } else if let Some(value) = arg
            .strip_prefix("--output=")
            .or_else(|| arg.strip_prefix("-o="))
            .or_else(|| arg.strip_prefix("-o"))
        {
            format = Some(value.to_string());
        }
    }

    match format.as_deref() {
        None | Some("wide") => OutputShape::Table,
        Some("name") => OutputShape::Names,
        Some(_) => OutputShape::Raw,
    }
}

/// Turn kubectl output into an answer: resource listings become a
/// comma-separated list of simplified names, anything else is returned as is
pub fn format_output(args: &[String], stdout: &str) -> String {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return "No resources found.".to_string();
    }

    match output_shape(args) {
        OutputShape::Names => trimmed
            .lines()
            .map(|l| simplify_name(l.trim().rsplit('/').next().unwrap_or(l)))
            .collect::<Vec<_>>()
            .join(", "),
        OutputShape::Table => {
            let mut lines = trimmed.lines();
            let header = lines.next().unwrap_or_default();
            match header.split_whitespace().position(|c| c == "NAME") {
                Some(idx) => lines
                    .filter_map(|l| l.split_whitespace().nth(idx))
                    .map(simplify_name)
                    .collect::<Vec<_>>()
                    .join(", "),
                None => trimmed.to_string(),
            }
        }
        OutputShape::Raw => trimmed.to_string(),
    }
}
