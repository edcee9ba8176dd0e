//! Shell tool — execute a command in a subprocess.
//!
//! Execution and output shaping live in [`ScriptRunner`]; this is the
//! model-facing wrapper.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool};
use crate::runner::ScriptRunner;

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────
// BashTool
// ─────────────────────────────────────────────

/// Execute shell commands in a subprocess.
pub struct BashTool {
    runner: ScriptRunner,
    timeout: Duration,
}

impl BashTool {
    pub fn new(runner: ScriptRunner, timeout_secs: Option<u64>) -> Self {
        Self {
            runner,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command and return its output. \
         Use this to inspect files, run programs, or read a failed script before fixing it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let command = require_string(&params, "command")?;
        Ok(self.runner.run_command(&command, self.timeout).await)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn params(command: &str) -> HashMap<String, Value> {
        let mut p = HashMap::new();
        p.insert("command".into(), json!(command));
        p
    }

    #[tokio::test]
    async fn test_bash_echo() {
        let tool = BashTool::new(ScriptRunner::new("sh"), None);
        let out = tool.execute(params("echo hello")).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_bash_failure_is_text() {
        let tool = BashTool::new(ScriptRunner::new("sh"), Some(5));
        let out = tool.execute(params("ls /definitely/not/here")).await.unwrap();
        assert!(out.starts_with("Command failed with exit code"));
    }

    #[tokio::test]
    async fn test_bash_timeout_uses_configured_limit() {
        let tool = BashTool::new(ScriptRunner::new("sh"), Some(1));
        let out = tool.execute(params("sleep 3")).await.unwrap();
        assert!(out.contains("(1 second limit)"));
    }

    #[tokio::test]
    async fn test_bash_missing_command() {
        let tool = BashTool::new(ScriptRunner::new("sh"), None);
        assert!(tool.execute(HashMap::new()).await.is_err());
    }

    #[test]
    fn test_bash_schema() {
        let tool = BashTool::new(ScriptRunner::new("sh"), None);
        let def = tool.to_definition();
        assert_eq!(def.function.name, "bash");
        assert_eq!(def.function.parameters["required"][0], "command");
    }
}
