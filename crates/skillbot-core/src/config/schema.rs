//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProviderConfig`, `ToolsConfig`,
//! `StorageConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::utils;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.skillbot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub provider: ProviderConfig,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Main agent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate per response (provider default if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Maximum model calls per user input before giving up.
    pub max_iterations: u32,
    /// Identity used to scope conversation listings.
    pub user_id: String,
    /// System prompt template. `{skill_summaries}` is substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            temperature: 0.0,
            max_tokens: None,
            max_iterations: 20,
            user_id: "cli_user".to_string(),
            prompt_file: None,
        }
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// OpenAI-compatible endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Base URL of the chat completions API.
    pub api_base: String,
    /// API key (local servers usually accept anything).
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

pub const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            extra_headers: None,
        }
    }
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Tool and capability settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Tool names that require human approval before running.
    pub gated_tools: Vec<String>,
    pub bash: BashToolConfig,
    /// Root directory scanned for `*/SKILL.md`.
    pub skills_dir: String,
    /// Root directory for `glob_search` / `grep_search`.
    pub file_search_root: String,
    /// Directory for temporary script artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<String>,
    pub data_analysis: DataAnalysisConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            gated_tools: vec!["bash".to_string()],
            bash: BashToolConfig::default(),
            skills_dir: "skills".to_string(),
            file_search_root: ".".to_string(),
            artifact_dir: None,
            data_analysis: DataAnalysisConfig::default(),
        }
    }
}

impl ToolsConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir
            .as_deref()
            .map(utils::expand_home)
            .unwrap_or_else(utils::default_artifact_dir)
    }
}

/// Shell command execution settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BashToolConfig {
    /// Command timeout in seconds.
    pub timeout: u64,
}

impl Default for BashToolConfig {
    fn default() -> Self {
        Self { timeout: 30 }
    }
}

/// Data-analysis subagent settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataAnalysisConfig {
    /// Script timeout in seconds.
    pub timeout: u64,
    /// Interpreter used to run generated scripts.
    pub interpreter: String,
    /// Omit sample rows from the subagent's file summary.
    pub privacy_mode: bool,
    /// Model override for the subagent (main model if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_iterations: u32,
}

impl Default for DataAnalysisConfig {
    fn default() -> Self {
        Self {
            timeout: 60,
            interpreter: "python".to_string(),
            privacy_mode: false,
            model: None,
            max_iterations: 15,
        }
    }
}

// ─────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────

/// Where checkpoints and conversation metadata live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.skillbot/data".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        utils::expand_home(&self.data_dir)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.model, "qwen3:8b");
        assert_eq!(config.agent.temperature, 0.0);
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.agent.user_id, "cli_user");
        assert_eq!(config.tools.gated_tools, vec!["bash"]);
        assert_eq!(config.tools.bash.timeout, 30);
        assert_eq!(config.tools.data_analysis.timeout, 60);
        assert_eq!(config.tools.data_analysis.interpreter, "python");
        assert_eq!(config.provider.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "agent": {"model": "llama3.1", "maxIterations": 5, "userId": "alice"},
            "tools": {
                "gatedTools": ["bash", "run_script"],
                "dataAnalysis": {"privacyMode": true, "timeout": 10}
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.agent.model, "llama3.1");
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.user_id, "alice");
        assert_eq!(config.tools.gated_tools.len(), 2);
        assert!(config.tools.data_analysis.privacy_mode);
        assert_eq!(config.tools.data_analysis.timeout, 10);
        // Defaults preserved for missing fields
        assert_eq!(config.tools.bash.timeout, 30);
        assert_eq!(config.tools.data_analysis.interpreter, "python");
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["agent"].get("maxIterations").is_some());
        assert!(json["tools"].get("gatedTools").is_some());
        assert!(json["tools"].get("fileSearchRoot").is_some());
        assert!(json["agent"].get("max_iterations").is_none());
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.agent.model, "qwen3:8b");
        assert_eq!(config.storage.data_dir, "~/.skillbot/data");
    }
}
