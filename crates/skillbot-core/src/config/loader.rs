//! Config loader — reads `~/.skillbot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.skillbot/config.json`
//! 3. Environment variables `SKILLBOT_<SECTION>__<FIELD>`
//! 4. Deployment variables `SKILL_DIR`, `AGENT_DB_PATH`, `AGENT_USER_ID`,
//!    `OLLAMA_HOST` (highest)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_file(&config_path))
}

/// Load config from a specific file path, without env overrides.
fn load_config_file(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply variable overrides from `lookup` on top of a loaded config.
///
/// Supported overrides:
/// - `SKILLBOT_AGENT__MODEL`, `SKILLBOT_AGENT__TEMPERATURE`,
///   `SKILLBOT_AGENT__MAX_ITERATIONS`, `SKILLBOT_AGENT__USER_ID`
/// - `SKILLBOT_PROVIDER__API_BASE`, `SKILLBOT_PROVIDER__API_KEY`
/// - `SKILLBOT_TOOLS__GATED_TOOLS` (comma-separated), `SKILLBOT_TOOLS__BASH__TIMEOUT`,
///   `SKILLBOT_TOOLS__DATA_ANALYSIS__PRIVACY_MODE`, `SKILLBOT_TOOLS__DATA_ANALYSIS__INTERPRETER`
/// - `SKILLBOT_STORAGE__DATA_DIR`
/// - `SKILL_DIR`, `AGENT_DB_PATH`, `AGENT_USER_ID`, `OLLAMA_HOST`
fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    // Agent
    if let Some(val) = lookup("SKILLBOT_AGENT__MODEL") {
        config.agent.model = val;
    }
    if let Some(t) = lookup("SKILLBOT_AGENT__TEMPERATURE").and_then(|v| v.parse().ok()) {
        config.agent.temperature = t;
    }
    if let Some(n) = lookup("SKILLBOT_AGENT__MAX_ITERATIONS").and_then(|v| v.parse().ok()) {
        config.agent.max_iterations = n;
    }
    if let Some(val) = lookup("SKILLBOT_AGENT__USER_ID") {
        config.agent.user_id = val;
    }

    // Provider
    if let Some(host) = lookup("OLLAMA_HOST") {
        config.provider.api_base = ollama_api_base(&host);
    }
    if let Some(val) = lookup("SKILLBOT_PROVIDER__API_BASE") {
        config.provider.api_base = val;
    }
    if let Some(val) = lookup("SKILLBOT_PROVIDER__API_KEY") {
        config.provider.api_key = val;
    }

    // Tools
    if let Some(val) = lookup("SKILLBOT_TOOLS__GATED_TOOLS") {
        config.tools.gated_tools = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(n) = lookup("SKILLBOT_TOOLS__BASH__TIMEOUT").and_then(|v| v.parse().ok()) {
        config.tools.bash.timeout = n;
    }
    if let Some(val) = lookup("SKILLBOT_TOOLS__DATA_ANALYSIS__PRIVACY_MODE") {
        config.tools.data_analysis.privacy_mode = val == "true" || val == "1";
    }
    if let Some(val) = lookup("SKILLBOT_TOOLS__DATA_ANALYSIS__INTERPRETER") {
        config.tools.data_analysis.interpreter = val;
    }

    // Storage
    if let Some(val) = lookup("SKILLBOT_STORAGE__DATA_DIR") {
        config.storage.data_dir = val;
    }

    // Deployment variables
    if let Some(val) = lookup("SKILL_DIR") {
        config.tools.skills_dir = val;
    }
    if let Some(val) = lookup("AGENT_DB_PATH") {
        config.storage.data_dir = val;
    }
    if let Some(val) = lookup("AGENT_USER_ID") {
        config.agent.user_id = val;
    }

    config
}

/// `OLLAMA_HOST` is a bare host (`localhost:11434` or `http://host:port`);
/// the OpenAI-compatible API lives under `/v1`.
fn ollama_api_base(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if with_scheme.ends_with("/v1") {
        with_scheme
    } else {
        format!("{with_scheme}/v1")
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_file(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.agent.model, "qwen3:8b");
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(r#"{"agent": {"model": "mistral", "maxIterations": 8}}"#);
        let config = load_config_file(file.path());
        assert_eq!(config.agent.model, "mistral");
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.agent.temperature, 0.0);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_file(file.path());
        assert_eq!(config.tools.bash.timeout, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.agent.model = "llama3.1:8b".to_string();
        config.tools.gated_tools = vec!["bash".into(), "run_script".into()];
        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_file(&path);
        assert_eq!(reloaded.agent.model, "llama3.1:8b");
        assert_eq!(reloaded.tools.gated_tools, vec!["bash", "run_script"]);
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = apply_overrides(
            Config::default(),
            vars(&[
                ("SKILLBOT_AGENT__MODEL", "test-model"),
                ("SKILLBOT_TOOLS__GATED_TOOLS", "bash, run_script ,"),
                ("SKILLBOT_TOOLS__BASH__TIMEOUT", "5"),
                ("SKILLBOT_TOOLS__DATA_ANALYSIS__PRIVACY_MODE", "1"),
            ]),
        );
        assert_eq!(config.agent.model, "test-model");
        assert_eq!(config.tools.gated_tools, vec!["bash", "run_script"]);
        assert_eq!(config.tools.bash.timeout, 5);
        assert!(config.tools.data_analysis.privacy_mode);
    }

    #[test]
    fn test_deployment_variables() {
        let config = apply_overrides(
            Config::default(),
            vars(&[
                ("SKILL_DIR", "/opt/skills"),
                ("AGENT_DB_PATH", "/var/lib/agent"),
                ("AGENT_USER_ID", "ops"),
                ("OLLAMA_HOST", "gpu-box:11434"),
            ]),
        );
        assert_eq!(config.tools.skills_dir, "/opt/skills");
        assert_eq!(config.storage.data_dir, "/var/lib/agent");
        assert_eq!(config.agent.user_id, "ops");
        assert_eq!(config.provider.api_base, "http://gpu-box:11434/v1");
    }

    #[test]
    fn test_invalid_numbers_are_ignored() {
        let config = apply_overrides(
            Config::default(),
            vars(&[("SKILLBOT_AGENT__MAX_ITERATIONS", "many")]),
        );
        assert_eq!(config.agent.max_iterations, 20);
    }

    #[test]
    fn test_ollama_api_base() {
        assert_eq!(ollama_api_base("http://localhost:11434/"), "http://localhost:11434/v1");
        assert_eq!(ollama_api_base("https://x.io/v1"), "https://x.io/v1");
    }
}
