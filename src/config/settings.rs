//! TOML-based configuration for dynq.
//!
//! Supports a config file (dynq.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [server]
//! bind = "0.0.0.0:6173"
//!
//! [store]
//! path = "/var/lib/dynq/dynq.db"
//!
//! [completion]
//! api_key = "${OPENAI_API_KEY}"
//! model = "gpt-5-mini"
//! timeout_secs = 300
//!
//! [tools]
//! server_label = "warehouse_mcp"
//! server_url = "https://mcp.internal/mcp"
//!
//! [engine]
//! base_url = "http://trino:8080"
//! user = "reports"
//!
//! [streaming]
//! emit_error_events = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generation::GenerationSettings;
use crate::sql::{Compiler, DEFAULT_MAX_DEPTH};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub completion: CompletionSettings,
    pub tools: ToolSettings,
    pub engine: EngineSettings,
    pub streaming: StreamingSettings,
    pub compiler: CompilerSettings,
    pub logging: LoggingSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:6173".to_string(),
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file path (supports ${ENV_VAR} expansion). Defaults to
    /// `~/.dynq/dynq.db`.
    pub path: Option<String>,
}

impl StoreSettings {
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Completion service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    /// API key (supports ${ENV_VAR} expansion).
    pub api_key: String,
    pub model: String,
    /// Upper bound on one completion exchange, streamed or not.
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-5-mini".to_string(),
            timeout_secs: 300,
        }
    }
}

impl CompletionSettings {
    pub fn resolved_api_key(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.api_key)
    }

    pub fn resolved_base_url(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Catalog tool server offered to the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    pub server_label: String,
    pub server_description: String,
    /// Tool server URL (supports ${ENV_VAR} expansion).
    pub server_url: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        let defaults = GenerationSettings::default();
        Self {
            server_label: defaults.tool_server_label,
            server_description: defaults.tool_server_description,
            server_url: defaults.tool_server_url,
        }
    }
}

/// Analytic engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Engine URL (supports ${ENV_VAR} expansion).
    pub base_url: String,
    pub user: String,
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            user: "dynq".to_string(),
            timeout_secs: 120,
        }
    }
}

impl EngineSettings {
    pub fn resolved_base_url(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Streaming relay settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Send an `error` event before ending a failed stream.
    pub emit_error_events: bool,
}

/// Compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub max_depth: usize,
    /// Join ON clauses use each join's own local table instead of `t1`.
    pub resolve_join_locals: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            resolve_join_locals: false,
        }
    }
}

impl CompilerSettings {
    pub fn compiler(&self) -> Compiler {
        Compiler::new()
            .with_max_depth(self.max_depth)
            .with_join_local_resolution(self.resolve_join_locals)
    }
}

/// Logging settings. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DYNQ_CONFIG`
    /// 2. `./dynq.toml`
    /// 3. `~/.config/dynq/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DYNQ_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dynq.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dynq").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.completion.timeout_secs == 0 || self.engine.timeout_secs == 0 {
            return Err(SettingsError::InvalidConfig(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        if self.compiler.max_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_depth must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Generation settings for the orchestrator.
    pub fn generation(&self) -> Result<GenerationSettings, SettingsError> {
        Ok(GenerationSettings {
            model: self.completion.model.clone(),
            tool_server_label: self.tools.server_label.clone(),
            tool_server_description: self.tools.server_description.clone(),
            tool_server_url: expand_env_vars(&self.tools.server_url)?,
            emit_error_events: self.streaming.emit_error_events,
        })
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            let name: String = chars.by_ref().take_while(|ch| *ch != '}').collect();
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
