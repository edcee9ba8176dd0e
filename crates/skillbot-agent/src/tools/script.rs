//! Script tool — persist generated code and run it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool};
use crate::runner::{ArtifactScope, ScriptRunner};

/// Default script timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runs a script body with the runner's interpreter.
///
/// Artifacts belong to the supplied scope, so failed scripts stay readable
/// until the scope is cleaned up.
pub struct RunScriptTool {
    runner: ScriptRunner,
    timeout: Duration,
    scope: Arc<ArtifactScope>,
}

impl RunScriptTool {
    pub fn new(runner: ScriptRunner, timeout_secs: Option<u64>, scope: Arc<ArtifactScope>) -> Self {
        Self {
            runner,
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            scope,
        }
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn name(&self) -> &str {
        "run_script"
    }

    fn description(&self) -> &str {
        "Run a complete Python script and return its standard output. \
         On failure the script is kept on disk and its path is reported."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "script": {
                    "type": "string",
                    "description": "Full source of the script to run"
                }
            },
            "required": ["script"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let script = require_string(&params, "script")?;
        Ok(self.runner.run_script(&script, self.timeout, &self.scope).await)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_failed_script_path_is_reported_and_kept() {
        let dir = tempdir().unwrap();
        let scope = Arc::new(ArtifactScope::with_naming(dir.path(), "analysis_", ".sh"));
        let tool = RunScriptTool::new(ScriptRunner::new("sh"), Some(5), scope.clone());

        let mut params = HashMap::new();
        params.insert("script".into(), json!("exit 4"));
        let out = tool.execute(params).await.unwrap();

        let kept = scope.remaining();
        assert_eq!(kept.len(), 1);
        assert!(out.contains(&kept[0].display().to_string()));
        assert!(out.contains("(exit code 4)"));
    }

    #[tokio::test]
    async fn test_missing_code_param() {
        let dir = tempdir().unwrap();
        let scope = Arc::new(ArtifactScope::new(dir.path()));
        let tool = RunScriptTool::new(ScriptRunner::new("sh"), None, scope);
        let err = tool.execute(HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("script"));
    }
}
