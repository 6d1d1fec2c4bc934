use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level agentflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
}

/// Limits applied to every workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Total node dispatches allowed per run.
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
    /// Dispatches allowed for any single node per run (0 = unbounded).
    #[serde(default = "default_max_visits_per_node")]
    pub max_visits_per_node: usize,
    /// Timeout for each agent/function/prompt call (0 = unbounded).
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_visits: default_max_node_visits(),
            max_visits_per_node: default_max_visits_per_node(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Where the CLI looks for workflow files to preload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    #[serde(default = "default_workflows_dir")]
    pub dir: String,
    #[serde(default = "default_workflows_extension")]
    pub extension: String,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            dir: default_workflows_dir(),
            extension: default_workflows_extension(),
        }
    }
}

fn default_max_node_visits() -> usize { 10_000 }
fn default_max_visits_per_node() -> usize { 0 }
fn default_collaborator_timeout_secs() -> u64 { 120 }
fn default_log_filter() -> String { "agentflow=info,warn".to_string() }
fn default_workflows_dir() -> String { "workflows".to_string() }
fn default_workflows_extension() -> String { "flow".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        Self::from_toml_str(&content)
    }

    /// Like [`AppConfig::load`], but falls back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Serialize the effective configuration.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Workflow directory, resolved relative to `base` when not absolute.
    pub fn workflows_dir(&self, base: &Path) -> PathBuf {
        let dir = PathBuf::from(&self.workflows.dir);
        if dir.is_absolute() {
            dir
        } else {
            base.join(dir)
        }
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep the reference when the variable is unset
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_AGENTFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_AGENTFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_AGENTFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_AGENTFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_AGENTFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.max_visits_per_node, 0);
        assert_eq!(config.log.filter, "agentflow=info,warn");
        assert_eq!(config.workflows.extension, "flow");
    }

    #[test]
    fn test_partial_engine_section() {
        let config = AppConfig::from_toml_str(
            r#"
[engine]
collaborator_timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.engine.collaborator_timeout_secs, 5);
        assert_eq!(config.engine.max_node_visits, 10_000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[engine\nmax = ").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/agentflow.toml")).unwrap_err();
        assert!(matches!(err, FlowError::ConfigNotFound(_)));

        let config = AppConfig::load_or_default(Path::new("/nonexistent/agentflow.toml")).unwrap();
        assert_eq!(config.engine.max_node_visits, 10_000);
    }

    #[test]
    fn test_workflows_dir_relative_and_absolute() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.workflows_dir(Path::new("/srv")),
            PathBuf::from("/srv/workflows")
        );
        config.workflows.dir = "/etc/flows".into();
        assert_eq!(
            config.workflows_dir(Path::new("/srv")),
            PathBuf::from("/etc/flows")
        );
    }
}
