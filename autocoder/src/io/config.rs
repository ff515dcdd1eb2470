//! Session configuration stored as `autocoder.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::sandbox::SandboxConfig;

/// Session configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoderConfig {
    /// Attempt budget for one session.
    pub max_attempts: u32,

    /// Wall-clock budget for one iteration's generation phase, bounding
    /// in-place transport retries.
    pub iteration_timeout_secs: u64,

    /// Pause between transport retries.
    pub retry_backoff_secs: u64,

    pub model: ModelConfig,
    pub sandbox: SandboxSection,
    pub search: SearchSection,
}

/// Endpoint and request parameters for the model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Timeout for one generation request.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxSection {
    /// Base interpreter used to create the environment and as fallback.
    pub interpreter: String,
    /// Timeout for running generated code and scripts.
    pub command_timeout_secs: u64,
    /// Timeout for package installs (longer than code runs).
    pub install_timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchSection {
    /// External search backend command; keywords are appended as the final
    /// argument. Empty disables SEARCH actions.
    pub command: Vec<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            iteration_timeout_secs: 5 * 60,
            retry_backoff_secs: 1,
            model: ModelConfig::default(),
            sandbox: SandboxSection::default(),
            search: SearchSection::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1234,
            model: "local-model".to_string(),
            max_tokens: 2000,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            command_timeout_secs: 30,
            install_timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            command: vec!["websearch".to_string()],
            max_results: 5,
            timeout_secs: 30,
        }
    }
}

impl CoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.iteration_timeout_secs == 0 {
            return Err(anyhow!("iteration_timeout_secs must be > 0"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.sandbox.command_timeout_secs == 0 || self.sandbox.install_timeout_secs == 0 {
            return Err(anyhow!("sandbox timeouts must be > 0"));
        }
        if self.sandbox.output_limit_bytes == 0 {
            return Err(anyhow!("sandbox.output_limit_bytes must be > 0"));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(anyhow!("sandbox.interpreter must be non-empty"));
        }
        Ok(())
    }
}

impl SandboxSection {
    /// Translate the serialized section into the sandbox's runtime config.
    pub fn to_sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            interpreter: self.interpreter.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            install_timeout: Duration::from_secs(self.install_timeout_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CoderConfig::default()`.
pub fn load_config(path: &Path) -> Result<CoderConfig> {
    if !path.exists() {
        let cfg = CoderConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CoderConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &CoderConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CoderConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autocoder.toml");
        let mut cfg = CoderConfig::default();
        cfg.max_attempts = 8;
        cfg.sandbox.command_timeout_secs = 10;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let cfg = CoderConfig {
            max_attempts: 0,
            ..CoderConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: CoderConfig = toml::from_str("max_attempts = 3\n[model]\nport = 8080\n")
            .expect("parse");
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.model.port, 8080);
        assert_eq!(cfg.model.host, "localhost");
        assert_eq!(cfg.sandbox.command_timeout_secs, 30);
    }
}
