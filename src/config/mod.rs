//! TOML configuration with typed defaults.
//!
//! A missing config file is not an error; every field has a usable default
//! and the API key can come from the environment (`DEEPDIVER_API_KEY`,
//! loadable from a `.env` file).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/deepdiver.toml";
const DEFAULT_MODEL: &str = "deepseek-v3";
const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
const API_KEY_ENV: &str = "DEEPDIVER_API_KEY";

static ENV_LOADER: Once = Once::new();

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Connection and sampling settings for the completion backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: f64,
    pub enable_thinking: bool,
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_secs: 120.0,
            enable_thinking: false,
            stream: true,
        }
    }
}

/// Loop policy knobs, merged with the rendered system prompt into an
/// `AgentConfig` at startup.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub tolerate_hallucination: bool,
    pub stuck_threshold: usize,
    pub count_idle_steps: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 30,
            tolerate_hallucination: true,
            stuck_threshold: 2,
            count_idle_steps: true,
        }
    }
}

/// Where the agent may look, and where its prompt material lives.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub prompt_file: Option<PathBuf>,
    pub knowledge_file: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            prompt_file: None,
            knowledge_file: None,
        }
    }
}

/// Output caps for the filesystem tools.
#[derive(Debug, Clone)]
pub struct ToolLimits {
    pub grep_max_lines: usize,
    pub read_max_lines: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            grep_max_lines: 200,
            read_max_lines: 300,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentSettings,
    pub workspace: WorkspaceConfig,
    pub tools: ToolLimits,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    workspace: RawWorkspace,
    #[serde(default)]
    tools: RawTools,
}

#[derive(Debug, Deserialize, Default)]
struct RawLlm {
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    timeout_secs: Option<f64>,
    enable_thinking: Option<bool>,
    stream: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawAgent {
    max_steps: Option<usize>,
    tolerate_hallucination: Option<bool>,
    stuck_threshold: Option<usize>,
    count_idle_steps: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawWorkspace {
    root: Option<PathBuf>,
    prompt_file: Option<PathBuf>,
    knowledge_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RawTools {
    #[serde(default)]
    grep: RawToolLimit,
    #[serde(default)]
    read: RawToolLimit,
}

#[derive(Debug, Deserialize, Default)]
struct RawToolLimit {
    max_lines: Option<usize>,
}

/// Load environment variables from `.env` once per process.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}

impl AppConfig {
    /// Load from `path`, or from the default location. A missing default
    /// file falls back to built-in defaults; an explicitly given path must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        ensure_env_loaded();
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("configuration file not found, using defaults");
                Ok(Self::default().with_env_api_key())
            }
            Err(other) => Err(other),
        }
    }

    fn with_env_api_key(mut self) -> Self {
        if self.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                self.llm.api_key = key;
            }
        }
        self
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let defaults = AppConfig::default();
    let config = AppConfig {
        llm: LlmConfig {
            model: parsed.llm.model.unwrap_or(defaults.llm.model),
            base_url: parsed.llm.base_url.unwrap_or(defaults.llm.base_url),
            api_key: parsed.llm.api_key.unwrap_or(defaults.llm.api_key),
            max_tokens: parsed.llm.max_tokens.unwrap_or(defaults.llm.max_tokens),
            temperature: parsed.llm.temperature.unwrap_or(defaults.llm.temperature),
            timeout_secs: parsed.llm.timeout_secs.unwrap_or(defaults.llm.timeout_secs),
            enable_thinking: parsed
                .llm
                .enable_thinking
                .unwrap_or(defaults.llm.enable_thinking),
            stream: parsed.llm.stream.unwrap_or(defaults.llm.stream),
        },
        agent: AgentSettings {
            max_steps: parsed.agent.max_steps.unwrap_or(defaults.agent.max_steps),
            tolerate_hallucination: parsed
                .agent
                .tolerate_hallucination
                .unwrap_or(defaults.agent.tolerate_hallucination),
            stuck_threshold: parsed
                .agent
                .stuck_threshold
                .unwrap_or(defaults.agent.stuck_threshold),
            count_idle_steps: parsed
                .agent
                .count_idle_steps
                .unwrap_or(defaults.agent.count_idle_steps),
        },
        workspace: WorkspaceConfig {
            root: parsed.workspace.root.unwrap_or(defaults.workspace.root),
            prompt_file: parsed.workspace.prompt_file,
            knowledge_file: parsed.workspace.knowledge_file,
        },
        tools: ToolLimits {
            grep_max_lines: parsed
                .tools
                .grep
                .max_lines
                .unwrap_or(defaults.tools.grep_max_lines),
            read_max_lines: parsed
                .tools
                .read
                .max_lines
                .unwrap_or(defaults.tools.read_max_lines),
        },
    };
    Ok(config.with_env_api_key())
}
