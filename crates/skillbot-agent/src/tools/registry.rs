//! Tool Registry — name → tool dispatch.
//!
//! Every call produces a `String` for the model, even on failure: unknown
//! tools, malformed arguments, and tool errors all become descriptive text.

use std::collections::HashMap;
use std::sync::Arc;

use skillbot_core::types::{ToolCall, ToolDefinition};
use tracing::{debug, warn};

use super::base::Tool;

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name and dispatches calls.
///
/// Owns `Arc<dyn Tool>` so tools can be shared across threads.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if self.tools.contains_key(tool.name()) {
            warn!(tool = tool.name(), "tool registered twice, replacing");
        } else {
            debug!(tool = tool.name(), "registered tool");
        }
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the model-facing definitions for all registered tools.
    pub fn get_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Execute a tool by name with the given parameters.
    pub async fn execute(&self, name: &str, params: HashMap<String, serde_json::Value>) -> String {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "tool not found");
                return format!(
                    "Error: Tool '{name}' not found. Available tools: {}",
                    self.tool_names().join(", ")
                );
            }
        };

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                format!("Error executing {name}: {e}")
            }
        }
    }

    /// Execute a model tool call, parsing its JSON arguments first.
    pub async fn execute_call(&self, call: &ToolCall) -> String {
        match call.parse_arguments() {
            Ok(args) => self.execute(call.name(), args.into_iter().collect()).await,
            Err(e) => {
                warn!(tool = call.name(), error = %e, "malformed tool arguments");
                format!("Error: Invalid arguments for {}: {e}", call.name())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Minimal test tool.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to echo" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, params: HashMap<String, serde_json::Value>) -> anyhow::Result<String> {
            let text = params
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("(empty)");
            Ok(format!("Echo: {text}"))
        }
    }

    /// Tool that always fails.
    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}, "required": []})
        }
        async fn execute(&self, _params: HashMap<String, serde_json::Value>) -> anyhow::Result<String> {
            anyhow::bail!("intentional failure")
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert!(reg.has("echo"));
        assert!(!reg.has("nope"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_tool_names_and_definitions_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool));
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.tool_names(), vec!["echo", "fail"]);
        let defs = reg.get_definitions();
        assert_eq!(defs[0].function.name, "echo");
        assert_eq!(defs[1].function.name, "fail");
    }

    #[tokio::test]
    async fn test_execute_call_success() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let call = ToolCall::new("c1", "echo", r#"{"text": "hello"}"#);
        assert_eq!(reg.execute_call(&call).await, "Echo: hello");
    }

    #[tokio::test]
    async fn test_execute_not_found_lists_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let result = reg.execute("missing", HashMap::new()).await;
        assert_eq!(result, "Error: Tool 'missing' not found. Available tools: echo");
    }

    #[tokio::test]
    async fn test_execute_error_caught() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool));
        let result = reg.execute("fail", HashMap::new()).await;
        assert!(result.starts_with("Error executing fail:"));
        assert!(result.contains("intentional failure"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_text() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let call = ToolCall::new("c1", "echo", "{text: unquoted");
        let result = reg.execute_call(&call).await;
        assert!(result.starts_with("Error: Invalid arguments for echo:"));
    }
}
