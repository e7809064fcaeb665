//! Loop configuration stored in `buildloop.toml` at the working directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, resolved against the working directory.
pub const CONFIG_FILE_NAME: &str = "buildloop.toml";

/// Loop configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Output limit for the plan request.
    pub plan_max_tokens: u32,

    /// Output limit for the build request.
    pub build_max_tokens: u32,

    /// Pause between iterations, in seconds. The stop signal is observed here.
    pub pause_secs: u64,

    /// Characters of the plan shown in progress output.
    pub plan_preview_chars: usize,

    /// Target document, relative to the working directory.
    pub target_path: PathBuf,

    /// Current-state document, relative to the working directory.
    pub current_path: PathBuf,

    /// Directory for per-iteration transcripts, relative to the working
    /// directory. No transcript is written when unset.
    pub transcript_dir: Option<PathBuf>,

    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the Messages API (no trailing `/v1/messages`).
    pub base_url: String,

    /// Value of the `anthropic-version` header.
    pub version: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            version: "2023-06-01".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            plan_max_tokens: 1000,
            build_max_tokens: 4000,
            pause_secs: 5,
            plan_preview_chars: 200,
            target_path: PathBuf::from("target.md"),
            current_path: PathBuf::from("current.md"),
            transcript_dir: None,
            api: ApiConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if self.plan_max_tokens == 0 {
            return Err(anyhow!("plan_max_tokens must be > 0"));
        }
        if self.build_max_tokens == 0 {
            return Err(anyhow!("build_max_tokens must be > 0"));
        }
        if self.target_path.as_os_str().is_empty() {
            return Err(anyhow!("target_path must not be empty"));
        }
        if self.current_path.as_os_str().is_empty() {
            return Err(anyhow!("current_path must not be empty"));
        }
        if self.target_path == self.current_path {
            return Err(anyhow!("target_path and current_path must differ"));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(anyhow!("api.base_url must not be empty"));
        }
        if self.api.api_key_env.trim().is_empty() {
            return Err(anyhow!("api.api_key_env must not be empty"));
        }
        Ok(())
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
