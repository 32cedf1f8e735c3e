//! Agent configuration loaded from `agent.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::looping::DEFAULT_MAX_ITERATIONS;

/// Default config file name looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "agent.toml";

/// Agent configuration (TOML).
///
/// Every field has a default, so an absent file or a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory every tool is confined to. Relative paths resolve against the
    /// process working directory.
    pub sandbox_root: PathBuf,

    /// Maximum model consultations before the run is abandoned.
    pub max_iterations: u32,

    /// Characters returned by `get_file_content` before truncation.
    pub max_file_chars: usize,

    pub script: ScriptConfig,

    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptConfig {
    /// Interpreter executable, looked up on `PATH`.
    pub interpreter: String,
    /// Extension (without the dot) a script must carry.
    pub extension: String,
    /// Wall-clock budget for a single script run.
    pub timeout_secs: u64,
    /// Bytes kept per output stream; the rest is counted and dropped.
    pub output_limit_bytes: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            extension: "py".to_string(),
            timeout_secs: 30,
            output_limit_bytes: 100_000,
        }
    }
}

impl ScriptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.0-flash-001".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sandbox_root: PathBuf::from("."),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_file_chars: 10_000,
            script: ScriptConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.max_file_chars == 0 {
            return Err(anyhow!("max_file_chars must be > 0"));
        }
        if self.script.interpreter.trim().is_empty() {
            return Err(anyhow!("script.interpreter must be non-empty"));
        }
        if self.script.extension.trim().is_empty() || self.script.extension.starts_with('.') {
            return Err(anyhow!(
                "script.extension must be non-empty and given without a leading dot"
            ));
        }
        if self.script.timeout_secs == 0 {
            return Err(anyhow!("script.timeout_secs must be > 0"));
        }
        if self.script.output_limit_bytes == 0 {
            return Err(anyhow!("script.output_limit_bytes must be > 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must be non-empty"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
