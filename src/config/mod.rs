//! Configuration module for dynq.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CompilerSettings, CompletionSettings, EngineSettings, LoggingSettings,
    ServerSettings, Settings, SettingsError, StoreSettings, StreamingSettings, ToolSettings,
};
