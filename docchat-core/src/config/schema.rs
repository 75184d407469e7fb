//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for docchat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat defaults
    pub chat: ChatConfig,
    /// Inference endpoint configuration
    pub provider: ProviderConfig,
    /// Upload handling
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Workspace directory (sessions live under it)
    pub workspace: String,
    /// Default model
    pub model: String,
    /// Maximum tokens per response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            workspace: "~/.docchat/workspace".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Inference endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key; absence is a fatal startup condition for chat commands
    #[serde(default)]
    pub api_key: String,
    /// Override for the API base URL
    #[serde(default)]
    pub api_base: Option<String>,
    /// Extra HTTP headers sent with every request
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}

/// Upload handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Reject uploads larger than this many bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: u64,
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.docchat/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
