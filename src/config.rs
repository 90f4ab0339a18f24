use crate::models::{ModelConfig, PromptType};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Which kind of model-serving API the backend talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama `/api/generate`
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
}

/// Configuration for the model backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL of the model-serving API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default)]
    pub env_var_api_key: Option<String>,
    /// Context window cap passed with every request
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    /// Rate limit for backend requests per second, 0 disables it
    #[serde(default)]
    pub rate_limit_rps: f64,
    /// Extra attempts before a failure is recorded as an error placeholder
    #[serde(default)]
    pub max_retries: u32,
    /// Wait before a retry, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            endpoint: default_endpoint(),
            env_var_api_key: None,
            context_size: default_context_size(),
            rate_limit_rps: 0.0,
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_context_size() -> u32 {
    512
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_tasks_path() -> PathBuf {
    PathBuf::from("data.json")
}

fn default_answers_path() -> PathBuf {
    PathBuf::from("answers.json")
}

fn default_scores_path() -> PathBuf {
    PathBuf::from("scores.json")
}

fn default_charts_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_prompt_types() -> Vec<PromptType> {
    PromptType::ALL.to_vec()
}

/// Root configuration of an evaluation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Task definitions (JSON)
    #[serde(default = "default_tasks_path")]
    pub tasks_path: PathBuf,
    /// Generated answers (JSON), written by `generate`, read by `rate`
    #[serde(default = "default_answers_path")]
    pub answers_path: PathBuf,
    /// Score log (JSON), written by `rate`, read by `charts`
    #[serde(default = "default_scores_path")]
    pub scores_path: PathBuf,
    #[serde(default = "default_charts_dir")]
    pub charts_dir: PathBuf,
    /// Rating session checkpoint, rewritten after every submission
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    #[serde(default = "default_prompt_types")]
    pub prompt_types: Vec<PromptType>,
    /// Model configurations to evaluate
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.models.is_empty(), "at least one [[models]] entry is required");
        ensure!(!self.prompt_types.is_empty(), "prompt_types must not be empty");
        ensure!(self.backend.context_size > 0, "backend.context_size must be positive");

        let mut seen_models = HashSet::new();
        for model in &self.models {
            ensure!(
                seen_models.insert((model.name.as_str(), model.thinking)),
                "duplicate [[models]] entry: {} (thinking = {})",
                model.name,
                model.thinking
            );
        }

        let mut seen_prompts = HashSet::new();
        for prompt_type in &self.prompt_types {
            ensure!(
                seen_prompts.insert(*prompt_type),
                "duplicate prompt type in prompt_types: {}",
                prompt_type
            );
        }
        Ok(())
    }
}
