//! Tool trait — the abstract interface every agent tool must implement.
//!
//! Capabilities contribute tools; the registry dispatches model tool calls to
//! them by name.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use skillbot_core::types::ToolDefinition;

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every agent tool implements this trait.
///
/// The orchestrator collects tools from its capabilities, sends their schemas
/// to the model via `to_definition()`, and dispatches calls via `execute()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the model to call this tool (e.g. `"view_skill"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters (as a `serde_json::Value`).
    ///
    /// Must be `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returns the tool output as a string (the model reads this).
    /// On failure, return an `Err`; the registry converts it to an error
    /// string so the model can adapt.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    /// Build the `ToolDefinition` sent to the LLM.
    ///
    /// Default implementation — rarely needs overriding.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param, returning a user-friendly error.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

/// Extract an optional `String` param.
pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Extract an optional `String` param, treating blank strings as absent.
pub fn optional_nonempty(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    optional_string(params, key).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_string_present() {
        let mut params = HashMap::new();
        params.insert("skill_id".into(), json!("csv-analysis"));
        assert_eq!(require_string(&params, "skill_id").unwrap(), "csv-analysis");
    }

    #[test]
    fn test_require_string_missing() {
        let params = HashMap::new();
        let err = require_string(&params, "command").unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: command");
    }

    #[test]
    fn test_require_string_wrong_type() {
        let mut params = HashMap::new();
        params.insert("code".into(), json!(42));
        assert!(require_string(&params, "code").is_err());
    }

    #[test]
    fn test_optional_string() {
        let mut params = HashMap::new();
        params.insert("file".into(), json!("reference.md"));
        assert_eq!(optional_string(&params, "file"), Some("reference.md".into()));
        assert_eq!(optional_string(&params, "other"), None);
    }

    #[test]
    fn test_optional_nonempty() {
        let mut params = HashMap::new();
        params.insert("path".into(), json!("  "));
        params.insert("include".into(), json!("*.rs"));
        assert_eq!(optional_nonempty(&params, "path"), None);
        assert_eq!(optional_nonempty(&params, "include"), Some("*.rs".into()));
    }

    /// Verify the default `to_definition()` produces the right shape.
    #[tokio::test]
    async fn test_to_definition_default() {
        struct NoopTool;

        #[async_trait]
        impl Tool for NoopTool {
            fn name(&self) -> &str { "noop" }
            fn description(&self) -> &str { "Does nothing" }
            fn parameters(&self) -> Value {
                json!({
                    "type": "object",
                    "properties": {
                        "msg": { "type": "string" }
                    },
                    "required": ["msg"]
                })
            }
            async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<String> {
                Ok("ok".into())
            }
        }

        let def = NoopTool.to_definition();
        assert_eq!(def.function.name, "noop");
        assert_eq!(def.function.description, "Does nothing");
        assert_eq!(def.tool_type, "function");
    }
}
