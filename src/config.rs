use crate::error::MatrixGptError;
use crate::logging::{FileLogSettings, LogRotation};
use crate::policy::{Policy, SuffixList};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant taking part in a Matrix group chat. Answer the latest message concisely.";

fn default_llm_provider() -> String {
    "openai".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_data_dir() -> String {
    "./matrixgpt.data".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_retention_days() -> u32 {
    30
}
fn default_sync_timeout_ms() -> u64 {
    30_000
}
fn default_stale_threshold_ms() -> i64 {
    50_000
}
fn default_context_window_size() -> usize {
    100
}
fn default_context_recency_ms() -> i64 {
    5_400_000
}
fn default_typing_timeout_ms() -> u64 {
    180_000
}
fn default_true() -> bool {
    true
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn provider_allows_empty_api_key(provider: &str) -> bool {
    matches!(provider, "ollama")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    // Matrix account
    #[serde(default)]
    pub homeserver_url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,

    // Model
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub llm_base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    // Admission
    #[serde(default)]
    pub sender_blacklist: SuffixList,
    #[serde(default)]
    pub sender_whitelist: SuffixList,
    #[serde(default)]
    pub room_blacklist: SuffixList,
    #[serde(default)]
    pub room_whitelist: SuffixList,
    #[serde(default)]
    pub ignore_media: bool,
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: i64,

    // Context and reply
    #[serde(default = "default_context_window_size")]
    pub context_window_size: usize,
    #[serde(default = "default_context_recency_ms")]
    pub context_recency_ms: i64,
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub threads: bool,
    #[serde(default = "default_true")]
    pub rich_text: bool,

    // Process
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_rotation: LogRotation,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Config {
    pub fn resolve_config_path() -> Result<Option<PathBuf>, MatrixGptError> {
        // 1. Check MATRIXGPT_CONFIG env var for custom path
        if let Ok(custom) = std::env::var("MATRIXGPT_CONFIG") {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(MatrixGptError::Config(format!(
                "MATRIXGPT_CONFIG points to non-existent file: {custom}"
            )));
        }

        for candidate in ["./matrixgpt.config.yaml", "./matrixgpt.config.yml"] {
            if std::path::Path::new(candidate).exists() {
                return Ok(Some(PathBuf::from(candidate)));
            }
        }
        Ok(None)
    }

    /// Load config from YAML file, then apply env overrides and validation.
    pub fn load() -> Result<Self, MatrixGptError> {
        let Some(path) = Self::resolve_config_path()? else {
            return Err(MatrixGptError::Config(
                "No matrixgpt.config.yaml found. Create one or set MATRIXGPT_CONFIG.".into(),
            ));
        };

        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| MatrixGptError::Config(format!("Failed to read {path_str}: {e}")))?;
        Self::from_yaml_str(&content)
            .map_err(|e| MatrixGptError::Config(format!("{path_str}: {e}")))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, MatrixGptError> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| MatrixGptError::Config(format!("Failed to parse YAML: {e}")))?;
        config.apply_env_overrides();
        config.post_deserialize()?;
        Ok(config)
    }

    /// Secrets may live in the environment instead of the YAML file.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("MATRIXGPT_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                self.access_token = token;
            }
        }
        if let Ok(key) = std::env::var("MATRIXGPT_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = key;
            }
        }
    }

    /// Apply post-deserialization normalization and validation.
    pub(crate) fn post_deserialize(&mut self) -> Result<(), MatrixGptError> {
        self.llm_provider = self.llm_provider.trim().to_lowercase();
        self.homeserver_url = self.homeserver_url.trim().trim_end_matches('/').to_string();
        self.access_token = self.access_token.trim().to_string();

        // Apply provider-specific default model if empty
        if self.model.trim().is_empty() {
            self.model = match self.llm_provider.as_str() {
                "anthropic" => "claude-sonnet-4-5-20250929".into(),
                "ollama" => "llama3.2".into(),
                _ => "gpt-4o-mini".into(),
            };
        }

        if let Some(ref url) = self.llm_base_url {
            if url.trim().is_empty() {
                self.llm_base_url = None;
            }
        }
        if self.system_prompt.trim().is_empty() {
            self.system_prompt = default_system_prompt();
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self.log_level.trim().is_empty() {
            self.log_level = default_log_level();
        }
        if self.log_retention_days == 0 {
            self.log_retention_days = default_log_retention_days();
        }
        if self.sync_timeout_ms == 0 {
            self.sync_timeout_ms = default_sync_timeout_ms();
        }
        if self.stale_threshold_ms <= 0 {
            self.stale_threshold_ms = default_stale_threshold_ms();
        }
        if self.context_window_size == 0 {
            self.context_window_size = default_context_window_size();
        }
        if self.context_recency_ms <= 0 {
            self.context_recency_ms = default_context_recency_ms();
        }
        if self.typing_timeout_ms == 0 {
            self.typing_timeout_ms = default_typing_timeout_ms();
        }

        // Validate required fields
        if self.homeserver_url.is_empty() {
            return Err(MatrixGptError::Config("homeserver_url is required".into()));
        }
        if !(self.homeserver_url.starts_with("http://")
            || self.homeserver_url.starts_with("https://"))
        {
            return Err(MatrixGptError::Config(format!(
                "homeserver_url must start with http:// or https://: {}",
                self.homeserver_url
            )));
        }
        if self.access_token.is_empty() {
            return Err(MatrixGptError::Config("access_token is required".into()));
        }
        if self.api_key.trim().is_empty() && !provider_allows_empty_api_key(&self.llm_provider) {
            return Err(MatrixGptError::Config("api_key is required".into()));
        }

        Ok(())
    }

    pub fn file_log_settings(&self) -> FileLogSettings {
        FileLogSettings::new(&self.data_dir, self.log_rotation, self.log_retention_days)
    }

    /// Immutable reply policy snapshot handed to the pipeline.
    pub fn policy(&self) -> Policy {
        Policy {
            sender_blacklist: self.sender_blacklist.clone(),
            sender_whitelist: self.sender_whitelist.clone(),
            room_blacklist: self.room_blacklist.clone(),
            room_whitelist: self.room_whitelist.clone(),
            ignore_non_text: self.ignore_media,
            stale_threshold_ms: self.stale_threshold_ms,
            context_window_size: self.context_window_size,
            context_recency_ms: self.context_recency_ms,
            threading_enabled: self.threads,
            rich_text_enabled: self.rich_text,
            system_prompt: self.system_prompt.clone(),
            typing_timeout_ms: self.typing_timeout_ms,
        }
    }
}
